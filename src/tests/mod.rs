// Test modules for the broadcast-llm crate
//
// Test organization follows the template pattern where each source file
// has a corresponding test file that focuses on business logic verification.

// Test helper utilities (fixture stores and credential maps)
pub mod helpers;


// NOTE: Anything that talks HTTP lives in the crate-level integration tests
// (tests/*_integration_tests.rs) behind a mock server. Unit tests here run
// without the network; dispatch tests only exercise paths that never dial.
