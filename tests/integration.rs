// Integration tests module

mod integration {
    mod support;

    mod alerts_test;
    mod analysis_test;
    mod config_test;
    mod fixture_test;
    mod logging_test;
    mod orchestrator_test;
    mod registry_test;
    mod runtime_test;
    mod storage_test;
}
