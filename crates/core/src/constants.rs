/// Constants shared across the kairo crates
// Operation tags carried in `PipelineError::operation`
pub const OP_MAP: &str = "map";
pub const OP_FILTER: &str = "filter";
pub const OP_REDUCE: &str = "reduce";
pub const OP_COMPOSE: &str = "compose";
pub const OP_BRANCH: &str = "branch_route";
pub const OP_PARTITION: &str = "partition_by";
pub const OP_PARALLEL: &str = "parallel";
pub const OP_VALIDATE: &str = "validate";
pub const OP_RETRY: &str = "retry";
pub const OP_TIMEOUT: &str = "timeout";
pub const OP_GUARD: &str = "guard";
pub const OP_TRAP: &str = "trap";
pub const OP_MEMOIZE: &str = "memoize";
pub const OP_SEQUENCE: &str = "sequence";
pub const OP_COMBINE: &str = "combine_results";

// Label used for operations that were not given one
pub const UNLABELED_OPERATION: &str = "operation";

// Branch and partition bucket names
pub const DEFAULT_BRANCH: &str = "default";

// Elementwise defaults
pub const DEFAULT_BATCH_SIZE: usize = 10;
