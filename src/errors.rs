//! Error hierarchy for the consensus core.
//!
//! Per spec: the core never rethrows from a handler. `StaleTerm`,
//! `LogInconsistency`, `AlreadyVoted`, `ApplyFailure`, and `TransportFailure`
//! are all encoded in response values or logged-and-swallowed; they never
//! appear here. Only `InvariantViolation` (a log port handing back an entry
//! whose index doesn't match its slot, or a truncate that would uncommit a
//! committed index) is fatal and surfaces as an `Err`.

error_chain! {
    foreign_links {
        Io(::std::io::Error);
    }

    errors {
        /// The log port (or some other collaborator) violated an invariant
        /// this core depends on. Not recoverable; the node should abort.
        InvariantViolation(msg: String) {
            description("raft invariant violation")
            display("raft invariant violation: {}", msg)
        }
    }
}
