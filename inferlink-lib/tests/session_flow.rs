//! End-to-end conversation tests against a scripted UDP mock device.

mod common;

use common::*;

#[tokio::test]
async fn happy_path_regression_two_rows() {
    let device = MockDevice::bind(ModelInfo::new(1, TaskType::Regression), vec![0.5]).await;
    let (result, stdout, requests) = run_session(device, "regression", "a,b\n1,2\n3,4\n").await;

    result.expect("clean shutdown");
    assert_eq!(stdout, "target\n0.500000\n0.500000\n");

    // one DATASET_SAMPLE request per CSV row, bracketed by the control steps
    assert_eq!(
        requests,
        vec![
            PacketKind::ModelInfo,
            PacketKind::DatasetInfo,
            PacketKind::DatasetSample,
            PacketKind::DatasetSample,
            PacketKind::PerfReport,
        ]
    );
}

#[tokio::test]
async fn classification_header_and_argmax() {
    let device = MockDevice::bind(
        ModelInfo::new(3, TaskType::MulticlassClassification),
        vec![0.1, 0.7, 0.2],
    )
    .await;
    let (result, stdout, _) = run_session(device, "classification", "x,y\n1,2\n").await;

    result.expect("clean shutdown");
    assert_eq!(
        stdout,
        "target,Probability of 0,Probability of 1,Probability of 2\n1,0.100000,0.700000,0.200000\n"
    );
}

#[tokio::test]
async fn silent_device_gets_retried_then_answers() {
    let mut device = MockDevice::bind(ModelInfo::new(1, TaskType::Regression), vec![0.5]).await;
    device.ignore_model_info = 2;
    let (result, _, requests) = run_session(device, "retry-success", "a\n1\n").await;

    result.expect("session succeeds on the third attempt");
    let model_info_requests = requests
        .iter()
        .filter(|kind| **kind == PacketKind::ModelInfo)
        .count();
    assert_eq!(model_info_requests, 3);
}

#[tokio::test]
async fn retry_budget_exhaustion_is_fatal() {
    let mut device = MockDevice::bind(ModelInfo::new(1, TaskType::Regression), vec![0.5]).await;
    device.mute_dataset_info = true;
    let (result, stdout, requests) = run_session(device, "retry-fatal", "a\n1\n").await;

    assert!(matches!(
        result,
        Err(Error::RetriesExhausted {
            state: SessionState::SendDatasetInfo,
            attempts: 4,
        })
    ));
    assert!(stdout.is_empty());

    // initial request plus three retries
    let dataset_info_requests = requests
        .iter()
        .filter(|kind| **kind == PacketKind::DatasetInfo)
        .count();
    assert_eq!(dataset_info_requests, 4);
}

#[tokio::test]
async fn corrupted_answer_is_ignored_and_sample_resent() {
    let mut device = MockDevice::bind(ModelInfo::new(1, TaskType::Regression), vec![0.25]).await;
    device.corrupt_first_prediction = true;
    let (result, stdout, requests) = run_session(device, "corrupt", "a\n1\n").await;

    result.expect("clean shutdown after resend");
    assert_eq!(stdout, "target\n0.250000\n");
    let sample_requests = requests
        .iter()
        .filter(|kind| **kind == PacketKind::DatasetSample)
        .count();
    assert_eq!(sample_requests, 2);
}

#[tokio::test]
async fn device_error_answer_delays_then_resends() {
    let mut device = MockDevice::bind(ModelInfo::new(1, TaskType::Regression), vec![0.75]).await;
    device.sample_error = Some(ErrorCode::SendAgain);
    let (result, stdout, requests) = run_session(device, "send-again", "a\n1\n").await;

    result.expect("clean shutdown after device error");
    assert_eq!(stdout, "target\n0.750000\n");
    let sample_requests = requests
        .iter()
        .filter(|kind| **kind == PacketKind::DatasetSample)
        .count();
    assert_eq!(sample_requests, 2);
}

#[tokio::test]
async fn zero_result_columns_is_fatal() {
    let device = MockDevice::bind(ModelInfo::new(0, TaskType::Regression), vec![]).await;
    let (result, stdout, _) = run_session(device, "zero-columns", "a\n1\n").await;

    assert!(matches!(result, Err(Error::NoResultColumns)));
    assert!(stdout.is_empty());
}

#[tokio::test]
async fn dataset_with_no_rows_is_fatal() {
    let device = MockDevice::bind(ModelInfo::new(1, TaskType::Regression), vec![0.5]).await;
    let (result, stdout, _) = run_session(device, "no-rows", "a,b,c\n").await;

    assert!(matches!(result, Err(Error::EmptyDataset)));
    assert!(stdout.is_empty());
}
