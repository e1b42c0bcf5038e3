//! Interactive exploration against a scripted driver

mod support;

use std::time::Duration;

use retrace_common::Command;
use retrace_engine::{DriverError, EngineError, ExecutorConfig, ExploreCommand, Explorer};
use support::FakeDriver;

const TIMEOUT: Duration = Duration::from_millis(30);

fn quick() -> ExecutorConfig {
    ExecutorConfig {
        timeout_grace: Duration::from_millis(50),
        ..ExecutorConfig::default()
    }
}

fn run_command(line: &str) -> Command {
    match line.parse::<ExploreCommand>().unwrap() {
        ExploreCommand::Run(command) => command,
        ExploreCommand::Done => panic!("expected a command for {:?}", line),
    }
}

#[tokio::test]
async fn session_opens_on_url_and_runs_commands() {
    let driver = FakeDriver::new();
    let config = ExecutorConfig::default();
    let mut explorer = Explorer::open(&driver, "https://shop.test/", TIMEOUT, &config)
        .await
        .unwrap();

    let outcome = explorer.run(&run_command("click #buy")).await.unwrap();
    assert_eq!(outcome.metadata["selector"], "#buy");
    explorer
        .run(&run_command("type input[name=q] red shoes"))
        .await
        .unwrap();
    let shot = explorer.run(&run_command("screenshot cart")).await.unwrap();
    assert_eq!(
        shot.metadata["screenshot_path"],
        std::path::Path::new("shots").join("cart.png").display().to_string()
    );
    assert_eq!(explorer.commands_run(), 4);

    explorer.close().await.unwrap();

    assert_eq!(
        driver.ops(),
        vec![
            "navigate:https://shop.test/",
            "click:#buy",
            "type:input[name=q]",
            "take_screenshot:cart",
        ]
    );
    assert_eq!(driver.state().closes, 1);
    assert_eq!(driver.state().aborts, 0);
}

#[tokio::test]
async fn failed_command_keeps_session_usable() {
    let driver = FakeDriver::new().failing("#gone", DriverError::ElementNotFound("#gone".into()));
    let mut explorer = Explorer::open(&driver, "https://shop.test/", TIMEOUT, &quick())
        .await
        .unwrap();

    let err = explorer.run(&run_command("click #gone")).await.unwrap_err();
    assert_eq!(err, DriverError::ElementNotFound("#gone".into()));
    explorer.run(&run_command("click #still-here")).await.unwrap();

    explorer.close().await.unwrap();
    assert_eq!(driver.state().closes, 1);
}

#[tokio::test]
async fn navigation_failure_aborts_session() {
    let driver = FakeDriver::new().failing(
        "https://down.test/",
        DriverError::Timeout("navigation".into()),
    );

    let err = Explorer::open(&driver, "https://down.test/", TIMEOUT, &quick())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, EngineError::Driver(DriverError::Timeout(_))));
    assert_eq!(driver.state().launches, 1);
    assert_eq!(driver.state().closes, 0);
    assert_eq!(driver.state().aborts, 1);
}

#[tokio::test]
async fn launch_failure_is_reported() {
    let driver = FakeDriver::new().configure(|s| s.fail_launch = true);
    let err = Explorer::open(&driver, "https://shop.test/", TIMEOUT, &quick())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::Launch(_)));
}

#[tokio::test]
async fn hanging_command_times_out() {
    let driver = FakeDriver::new().hanging("#spinner");
    let mut explorer = Explorer::open(&driver, "https://shop.test/", TIMEOUT, &quick())
        .await
        .unwrap();

    let err = explorer.run(&run_command("click #spinner")).await.unwrap_err();
    assert!(err.to_string().contains("did not complete within 80 ms"));

    drop(explorer);
    assert_eq!(driver.state().aborts, 1);
}
