use stockwise_core::AggregateId;

/// A command is a request to change exactly one aggregate.
///
/// One command maps to one stream append, which is the transaction boundary: either
/// every event the command produces is committed or none is.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
