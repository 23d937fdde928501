//! Token secret wrapper shared by the downstream token exchanger and idempotency ledger.

pub mod secret;
