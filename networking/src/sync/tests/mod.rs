mod support;
mod txn_sync_tests;
