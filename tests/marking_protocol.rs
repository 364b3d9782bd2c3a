use async_trait::async_trait;
use attendance::error::{AttendanceError, NotifyError};
use attendance::mailer::{AbsenceNotice, Notifier};
use attendance::marking::{AttendanceWriter, DEFAULT_AUDIT_SHEET, MarkOutcome, Submission};
use attendance::store::MemoryStore;
use attendance::store::memory::OpKind;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<AbsenceNotice>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        RecordingNotifier {
            fail: true,
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<AbsenceNotice> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: &AbsenceNotice) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notice.clone());
        if self.fail {
            return Err(NotifyError::Transport("smtp down".into()));
        }
        Ok(())
    }
}

fn school() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::default()
            .with_sheet(
                "ClassA",
                vec![
                    vec!["RollNumber", "Name", "Email", "Section"],
                    vec!["R1", "Asha", "a@x", "S1"],
                    vec!["R2", "Ben", "b@x", "S1"],
                    vec!["R3", "Chen", "c@x", "S2"],
                ],
            )
            .with_sheet(
                DEFAULT_AUDIT_SHEET,
                vec![vec!["Date", "User", "RollNumber", "Name", "Section", "Status"]],
            ),
    )
}

fn writer(store: &Arc<MemoryStore>, notifier: &Arc<RecordingNotifier>) -> AttendanceWriter {
    AttendanceWriter::new(store.clone(), notifier.clone(), DEFAULT_AUDIT_SHEET)
}

async fn settle(outcome: MarkOutcome) -> MarkOutcome {
    let MarkOutcome {
        date,
        column_index,
        column_created,
        cells_written,
        audit_rows,
        notifications,
    } = outcome;
    for handle in notifications {
        handle.await.unwrap();
    }
    MarkOutcome {
        date,
        column_index,
        column_created,
        cells_written,
        audit_rows,
        notifications: Vec::new(),
    }
}

fn audit_rows(store: &MemoryStore) -> Vec<Vec<String>> {
    store.sheet(DEFAULT_AUDIT_SHEET).unwrap().into_iter().skip(1).collect()
}

#[tokio::test]
async fn first_submission_creates_column_and_logs() {
    let store = school();
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);

    let outcome = writer
        .mark_attendance(
            "ClassA",
            &[Submission::new("R1", "Present"), Submission::new("R2", "Absent")],
            "teacher1",
            "2024-06-01",
        )
        .await
        .unwrap();
    let outcome = settle(outcome).await;

    assert!(outcome.column_created);
    assert_eq!(outcome.column_index, 4);
    assert_eq!(outcome.cells_written, 2);
    assert_eq!(outcome.audit_rows, 2);

    let grid = store.sheet("ClassA").unwrap();
    assert_eq!(
        grid[0],
        vec!["RollNumber", "Name", "Email", "Section", "2024-06-01"]
    );
    assert_eq!(grid[1][4], "Present");
    assert_eq!(grid[2][4], "Absent");
    assert_eq!(grid[3].get(4), None);

    assert_eq!(
        notifier.sent(),
        vec![AbsenceNotice::new("b@x", "Ben", "2024-06-01")]
    );

    assert_eq!(
        audit_rows(&store),
        vec![
            vec!["2024-06-01", "teacher1", "R1", "Asha", "S1", "Present"],
            vec!["2024-06-01", "teacher1", "R2", "Ben", "S1", "Absent"],
        ]
    );
}

#[tokio::test]
async fn resubmission_overwrites_cell_and_appends_audit() {
    let store = school();
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);

    settle(
        writer
            .mark_attendance(
                "ClassA",
                &[Submission::new("R1", "Present"), Submission::new("R2", "Absent")],
                "teacher1",
                "2024-06-01",
            )
            .await
            .unwrap(),
    )
    .await;
    store.clear_ops();

    let outcome = settle(
        writer
            .mark_attendance(
                "ClassA",
                &[Submission::new("R1", "Absent")],
                "teacher1",
                "2024-06-01",
            )
            .await
            .unwrap(),
    )
    .await;

    assert!(!outcome.column_created);
    assert_eq!(store.count(OpKind::Write), 0, "header must not be rewritten");
    assert_eq!(store.count(OpKind::BatchWrite), 1);
    assert_eq!(store.count(OpKind::Append), 1);

    let grid = store.sheet("ClassA").unwrap();
    assert_eq!(grid[0].len(), 5);
    assert_eq!(grid[1][4], "Absent");
    assert_eq!(grid[2][4], "Absent");

    let for_r1: Vec<_> = audit_rows(&store)
        .into_iter()
        .filter(|row| row[0] == "2024-06-01" && row[2] == "R1")
        .collect();
    assert_eq!(for_r1.len(), 2);
    assert_eq!(for_r1[1][5], "Absent");
    assert_eq!(notifier.sent().len(), 2);
}

#[tokio::test]
async fn unknown_roll_number_writes_nothing() {
    let store = school();
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);

    let err = writer
        .mark_attendance(
            "ClassA",
            &[Submission::new("R1", "Absent"), Submission::new("R9", "Present")],
            "teacher1",
            "2024-06-01",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::RollNumberNotFound(ref roll) if roll == "R9"));
    assert_eq!(store.count(OpKind::BatchWrite), 0);
    assert_eq!(store.count(OpKind::Append), 0);
    assert!(audit_rows(&store).is_empty());
    assert!(notifier.sent().is_empty());

    let grid = store.sheet("ClassA").unwrap();
    assert!(grid[1..].iter().all(|row| row.get(4).is_none()));
}

#[tokio::test]
async fn every_valid_submission_gets_a_cell_and_an_audit_row() {
    let store = school();
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);
    let submissions = [
        Submission::new("R3", "Late"),
        Submission::new("R1", "Present"),
        Submission::new("R2", "Excused"),
    ];

    let outcome = settle(
        writer
            .mark_attendance("ClassA", &submissions, "teacher2", "2024-06-03")
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(outcome.cells_written, submissions.len());
    let audit = audit_rows(&store);
    assert_eq!(audit.len(), submissions.len());
    for (row, submission) in audit.iter().zip(&submissions) {
        assert_eq!(row[2], submission.roll_number);
        assert_eq!(row[5], submission.status);
    }
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn absence_is_case_insensitive() {
    let store = school();
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);

    settle(
        writer
            .mark_attendance(
                "ClassA",
                &[
                    Submission::new("R1", "Absent"),
                    Submission::new("R2", "absent"),
                    Submission::new("R3", "ABSENT"),
                ],
                "teacher1",
                "2024-06-04",
            )
            .await
            .unwrap(),
    )
    .await;

    let addresses: Vec<String> = notifier.sent().into_iter().map(|n| n.address).collect();
    assert_eq!(addresses.len(), 3);
    for expected in ["a@x", "b@x", "c@x"] {
        assert!(addresses.iter().any(|a| a == expected));
    }
    // statuses are stored verbatim
    let grid = store.sheet("ClassA").unwrap();
    assert_eq!(grid[2][4], "absent");
    assert_eq!(grid[3][4], "ABSENT");
}

#[tokio::test]
async fn notification_failure_does_not_fail_marking() {
    let store = school();
    let notifier = Arc::new(RecordingNotifier::failing());
    let writer = writer(&store, &notifier);

    let outcome = settle(
        writer
            .mark_attendance(
                "ClassA",
                &[Submission::new("R2", "Absent")],
                "teacher1",
                "2024-06-01",
            )
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(outcome.audit_rows, 1);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn failed_batch_write_skips_audit() {
    let store = school();
    store.fail_on(OpKind::BatchWrite);
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);

    let err = writer
        .mark_attendance(
            "ClassA",
            &[Submission::new("R2", "Absent")],
            "teacher1",
            "2024-06-01",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::Store(_)));
    assert_eq!(store.count(OpKind::Append), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn failed_audit_append_leaves_grid_written() {
    let store = school();
    store.fail_on(OpKind::Append);
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);

    let err = writer
        .mark_attendance(
            "ClassA",
            &[Submission::new("R1", "Present")],
            "teacher1",
            "2024-06-01",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::Store(_)));
    assert_eq!(store.sheet("ClassA").unwrap()[1][4], "Present");
    assert!(audit_rows(&store).is_empty());
}

#[tokio::test]
async fn empty_batch_is_rejected_before_touching_the_store() {
    let store = school();
    let notifier = Arc::new(RecordingNotifier::default());
    let writer = writer(&store, &notifier);

    let err = writer
        .mark_attendance("ClassA", &[], "teacher1", "2024-06-01")
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::MissingFields(_)));
    assert!(store.ops().is_empty());
}
