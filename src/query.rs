//! Builder for a `QUERY{...}` request: condition and row-count limit set
//! independently, then executed against a [`Session`].

use crate::error::StashResult;
use crate::ids::{NamespaceId, TableId};
use crate::protocol::condition::Condition;
use crate::protocol::reply::Reply;
use crate::Session;

/// A query against one table, built up before being sent.
#[derive(Debug, Clone)]
pub struct Query {
    namespace_id: NamespaceId,
    table_id: TableId,
    condition: Option<Condition>,
    limit: Option<i64>,
}

impl Query {
    pub fn new(namespace_id: NamespaceId, table_id: TableId) -> Self {
        Query {
            namespace_id,
            table_id,
            condition: None,
            limit: None,
        }
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn execute(self, session: &mut Session) -> StashResult<Reply> {
        session.query(self.namespace_id, self.table_id, self.condition, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::KeyId;

    #[test]
    fn builder_accumulates_condition_and_limit() {
        let q = Query::new(NamespaceId::new(1).unwrap(), TableId::new(1).unwrap())
            .condition(Condition::exists(KeyId::new(1).unwrap()))
            .limit(5);
        assert!(q.condition.is_some());
        assert_eq!(q.limit, Some(5));
    }
}
