use std::process::Command;

use retrace_common::{Action, ScriptMode, TestScript, TestStep};
use retrace_engine::{PlaywrightConfig, PlaywrightDriver, TestExecutor};
use tempfile::TempDir;

fn node_has_playwright() -> bool {
    Command::new("node")
        .arg("-e")
        .arg("require('playwright')")
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Playwright Smoke Test
///
/// Replays a short script against an inline page through the real bridge.
///
/// Marked ignored because it needs Node.js with Playwright browsers installed.
#[tokio::test]
#[ignore]
async fn inline_page_replays_through_playwright() {
    if !node_has_playwright() {
        eprintln!("Skipping: node with playwright not available");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let driver = PlaywrightDriver::new(PlaywrightConfig {
        screenshot_dir: tmp.path().to_path_buf(),
        ..PlaywrightConfig::default()
    });

    let page = "data:text/html,<h1 data-testid='title'>Hello Retrace</h1>";
    let mut script = TestScript::new("smoke", "", ScriptMode::Dumb)
        .with_step(TestStep::new("open", Action::navigate(page)))
        .with_step(TestStep::new(
            "title",
            Action::assert_text("[data-testid='title']", "Hello"),
        ))
        .with_step(TestStep::new("missing", Action::click("#nope").with_timeout(500)));
    script.steps[1].screenshot = true;

    let result = TestExecutor::new(driver).execute(&script).await.unwrap();

    assert!(result.step_results[0].success);
    assert!(result.step_results[1].success);
    assert!(result.step_results[1].screenshot_path.as_ref().unwrap().exists());
    assert!(!result.step_results[2].success);
    assert!(result.step_results.iter().all(|s| s.dom_snapshot.is_some()));
}
