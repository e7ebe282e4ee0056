/*!
# tbuddy-core: a proof-generating BDD engine

`tbuddy-core` is a hash-consed binary decision diagram engine whose apply,
implication-test, and existential-quantify operations each emit a clausal
certificate (LRAT, DRAT, or FRAT) justifying their result, alongside a
trusted-BDD layer (TBDD) and an XOR/Gauss-Jordan constraint solver built
on top of it.

## Usage

```
use tbuddy_core::config::EngineConfig;
use tbuddy_core::engine::Engine;
use tbuddy_core::tbdd::Tbdd;

let mut engine = Engine::new(
    EngineConfig::new(),
    Box::new(Vec::new()),
    &[vec![2, 4], vec![3, 4]], // (x1 ∨ x2) ∧ (¬x1 ∨ x2)
    2,
)
.unwrap();
let t1 = Tbdd::from_clause_id(&mut engine, 2).unwrap();
let t2 = Tbdd::from_clause_id(&mut engine, 3).unwrap();
let conj = Tbdd::and(&mut engine, &t1, &t2).unwrap();
t1.release(&mut engine);
t2.release(&mut engine);
conj.release(&mut engine);
engine.finalize_proof().unwrap();
```

Every mutable piece of state — the node store, the operation cache, the
proof writer, and the extension-variable/clause counters — lives in a
single [`engine::Engine`] value threaded explicitly through every call,
rather than behind module-level statics.
*/
/// Crate `types` provides the shared identifier/literal encodings
/// (`VarId`, `NodeId`, `ClauseId`, `Lit`) and proof-format enums.
pub mod types;
/// Crate `error` provides `EngineError`, the engine's single error type.
pub mod error;
/// Crate `config` provides the engine's tunable parameters.
pub mod config;
/// Crate `ilist` provides a growable, typed list with the C-style
/// `IListKind` reinterpretation the specification's `ilist.c` idiom calls
/// for, re-expressed as a Rust `Vec`-backed struct.
pub mod ilist;
/// Crate `node_store` provides the hash-consed BDD node table: creation,
/// reference counting, garbage collection, and resizing.
pub mod node_store;
/// Crate `op_cache` provides the direct-mapped apply-result cache.
pub mod op_cache;
/// Crate `proof` emits LRAT/DRAT/FRAT clausal certificates, text or
/// binary.
pub mod proof;
/// Crate `engine` owns every piece of the engine's mutable state.
pub mod engine;
/// Crate `apply` implements recursive BDD apply (AND, implication test)
/// and existential quantify, each producing a clausal justification.
pub mod apply;
/// Crate `tbdd` is the trusted-BDD layer: a BDD root paired with the
/// clause asserting the CNF entails it.
pub mod tbdd;
/// Crate `xor` layers parity constraints and Gauss-Jordan elimination on
/// top of `tbdd`.
pub mod xor;
