//! Behavioural test suites for the host command server.
