//! Transaction helper macro.
//!
//! Transactions are opt-in and scoped by the caller through
//! [`Transactional`](crate::Transactional). Statements issued through the same
//! client between `begin` and `commit`/`rollback` run inside the transaction.
//!
//! # Example
//!
//! ```ignore
//! use myorm::{qb, OrmResult};
//!
//! # async fn demo(client: &myorm::MySqlClient) -> OrmResult<()> {
//! myorm::transaction!(client, {
//!     qb::update("accounts")
//!         .set("balance", 0)
//!         .where_equal("id", 1)
//!         .execute(client)
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `Transactional::begin`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `myorm::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $body:block) => {{
        use $crate::Transactional as _;
        let __myorm_tx_client = $client;
        match __myorm_tx_client.begin().await {
            Err(error) => Err(error),
            Ok(()) => {
                let __myorm_tx_body_result = async { $body }.await;
                match __myorm_tx_body_result {
                    Ok(value) => match __myorm_tx_client.commit().await {
                        Ok(()) => Ok(value),
                        Err(error) => Err(error),
                    },
                    Err(error) => match __myorm_tx_client.rollback().await {
                        Ok(()) => Err(error),
                        Err(rollback_err) => Err($crate::OrmError::Other(format!(
                            "{error} (rollback failed: {rollback_err})"
                        ))),
                    },
                }
            }
        }
    }};
}
