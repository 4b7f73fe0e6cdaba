//! Office conversion integration tests against a fake `soffice`.

#![cfg(unix)]

use std::time::Duration;

use tempfile::TempDir;

use convertino_core::{
    testing::{FakeToolchain, OfficeBehaviour},
    CancellationToken, ConversionOutcome, ConversionRequest, ConverterConfig, FailureKind,
    ToolSpec,
};

fn setup(behaviour: OfficeBehaviour) -> (FakeToolchain, TempDir) {
    let tools = FakeToolchain::new().expect("Failed to create fake toolchain");
    tools.install_office(behaviour).expect("Failed to install soffice");
    let work = TempDir::new().expect("Failed to create work dir");
    (tools, work)
}

fn scratch_dirs(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".convertino-"))
        .count()
}

#[tokio::test]
async fn test_office_output_is_moved_into_place() {
    let (tools, work) = setup(OfficeBehaviour::CopyInput);
    let source = work.path().join("minutes.docx");
    std::fs::write(&source, b"docx bytes").unwrap();
    let target = work.path().join("published/minutes-final.pdf");

    let outcome = tools
        .engine(ConverterConfig::default())
        .convert(ConversionRequest::new(&source, &target))
        .await;

    assert_eq!(outcome, ConversionOutcome::Success);
    assert_eq!(std::fs::read(&target).unwrap(), b"docx bytes");
    assert_eq!(scratch_dirs(&work.path().join("published")), 0);
}

#[tokio::test]
async fn test_clean_exit_without_output_is_failure() {
    let (tools, work) = setup(OfficeBehaviour::SilentNoOutput);
    let source = work.path().join("notes.txt");
    std::fs::write(&source, b"notes").unwrap();
    let target = work.path().join("notes.rtf");

    let outcome = tools
        .engine(ConverterConfig::default())
        .convert(ConversionRequest::new(&source, &target))
        .await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::ProcessFailure));
    assert!(!target.exists());
    assert_eq!(scratch_dirs(work.path()), 0);
}

#[tokio::test]
async fn test_failure_carries_tool_diagnostics() {
    let (tools, work) = setup(OfficeBehaviour::Fail {
        code: 1,
        stderr: "Error: source file could not be loaded".to_string(),
    });
    let source = work.path().join("letter.doc");
    std::fs::write(&source, b"doc").unwrap();
    let target = work.path().join("letter.html");

    let outcome = tools
        .engine(ConverterConfig::default())
        .convert(ConversionRequest::new(&source, &target))
        .await;

    match outcome {
        ConversionOutcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::ProcessFailure);
            assert!(detail.contains("could not be loaded"), "detail: {detail}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!target.exists());
}

#[tokio::test]
async fn test_missing_soffice_is_executable_not_found() {
    let work = TempDir::new().unwrap();
    let source = work.path().join("book.epub");
    std::fs::write(&source, b"epub").unwrap();
    let config =
        ConverterConfig::default().with_soffice(work.path().join("missing").join(ToolSpec::SOFFICE.name));

    let outcome = convertino_core::ConversionEngine::new(config)
        .convert(ConversionRequest::new(&source, work.path().join("book.pdf")))
        .await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::ExecutableNotFound));
}

#[tokio::test]
async fn test_cancellation_stops_soffice() {
    let (tools, work) = setup(OfficeBehaviour::Hang);
    let source = work.path().join("slow.docx");
    std::fs::write(&source, b"docx").unwrap();
    let target = work.path().join("slow.pdf");

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        })
    };

    let outcome = tools
        .engine(ConverterConfig::default())
        .convert(ConversionRequest::new(&source, &target).with_cancellation(token))
        .await;
    canceller.await.unwrap();

    assert_eq!(outcome, ConversionOutcome::Cancelled);
    assert!(!target.exists());
    assert_eq!(scratch_dirs(work.path()), 0);
}
