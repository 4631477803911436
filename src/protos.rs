/// Type used to uniquely identify each server/member. Assigned externally;
/// `0` is reserved to mean "no member" (used for `leader_id` /
/// `last_voted_for`).
pub type MemberId = u64;

pub type Term = u64;

/// 1-based log position. `0` means "no index".
pub type LogIndex = u64;

/// Every response produced by this module carries a `status`. Today the only
/// value ever produced internally is `Ok`; the field exists so a transport
/// layer built on top of this core has somewhere to put failures that occur
/// above this core (timeouts, deserialization errors, ...) without changing
/// the response shape the handlers produce.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
}

/// The kind of a single log entry. `Command` and `Tombstone` entries are
/// delivered to the state machine as they are committed; all other kinds
/// only advance `last_applied`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntryType {
    Command,
    Tombstone,
    Noop,
    Config,
}

impl LogEntryType {
    pub fn is_applicable(&self) -> bool {
        match self {
            LogEntryType::Command | LogEntryType::Tombstone => true,
            LogEntryType::Noop | LogEntryType::Config => false,
        }
    }
}

/// The format of a single log entry that is appended to every server's
/// replicated log. Each entry occupies exactly one log index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub index: LogIndex,
    pub term: Term,
    pub entry_type: LogEntryType,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

/// A resolved `(index, term)` pair identifying a single log position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogPosition {
    pub index: LogIndex,
    pub term: Term,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppendRequest {
    pub term: Term,
    pub leader_id: MemberId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub commit_index: LogIndex,
    pub recycle_index: LogIndex,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppendResponse {
    pub status: Status,
    pub term: Term,
    pub succeeded: bool,
    pub log_index: LogIndex,
}

/// A pre-vote probe: does not mutate `last_voted_for` or `current_term`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PollRequest {
    pub term: Term,
    pub candidate_id: MemberId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PollResponse {
    pub status: Status,
    pub term: Term,
    pub accepted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoteRequest {
    pub term: Term,
    pub candidate_id: MemberId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoteResponse {
    pub status: Status,
    pub term: Term,
    pub voted: bool,
}
