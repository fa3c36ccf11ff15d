pub mod assignment;
pub mod ledger;
pub mod profiles;
pub mod rewards;
