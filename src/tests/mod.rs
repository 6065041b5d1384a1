pub mod support;

mod network_tests;
