//! Database metrics: query latency by outcome and connection pool gauges.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record the duration of one query.
pub fn record_query_duration(query_name: &'static str, outcome: &'static str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name,
        "outcome" => outcome
    )
    .record(duration_secs);
}

/// Record connection pool gauges. Called periodically by the pool metrics job.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("database_connections_active").set(active as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
    gauge!("database_connections_max").set(pool.options().get_max_connections() as f64);
}

/// Times one query from creation until [`QueryTimer::finish`].
///
/// ```ignore
/// let timer = QueryTimer::new("find_integration_by_id");
/// let result = sqlx::query_as::<_, IntegrationEntity>(...).fetch_optional(&pool).await;
/// timer.finish(result)
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Records the elapsed time labelled with the query outcome and passes
    /// the result through.
    pub fn finish<T>(self, result: Result<T, sqlx::Error>) -> Result<T, sqlx::Error> {
        record_query_duration(
            self.query_name,
            query_outcome(&result),
            self.start.elapsed().as_secs_f64(),
        );
        result
    }
}

fn query_outcome<T>(result: &Result<T, sqlx::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(sqlx::Error::RowNotFound) => "not_found",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_outcome() {
        assert_eq!(query_outcome(&Ok::<_, sqlx::Error>(1)), "ok");
        assert_eq!(query_outcome::<()>(&Err(sqlx::Error::RowNotFound)), "not_found");
        assert_eq!(query_outcome::<()>(&Err(sqlx::Error::PoolTimedOut)), "error");
    }

    #[test]
    fn test_finish_passes_result_through() {
        let timer = QueryTimer::new("claim_queue_item");
        assert_eq!(timer.query_name, "claim_queue_item");
        assert_eq!(timer.finish(Ok::<_, sqlx::Error>(7)).unwrap(), 7);

        let timer = QueryTimer::new("claim_queue_item");
        assert!(timer.finish::<()>(Err(sqlx::Error::RowNotFound)).is_err());
    }
}
