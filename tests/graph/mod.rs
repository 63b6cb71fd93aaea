mod builder_tests;
mod concurrency_tests;
mod observer_tests;
mod scenario_tests;
