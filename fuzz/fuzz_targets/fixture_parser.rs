#![no_main]

use libfuzzer_sys::fuzz_target;
use lantern::fixture::PageLoadFixture;
use lantern::lantern_metric::get_script_urls;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and graph validation must reject bad input without panicking
        if let Ok(fixture) = PageLoadFixture::from_json_str(input) {
            if let Ok(graph) = fixture.dependency_graph() {
                let _ = get_script_urls(&graph, None);
                let _ = graph.clone_with_relationships(|node| node.end_time() > 0.0);
            }
        }
    }
});
