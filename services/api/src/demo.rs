use chrono::{Local, NaiveDate};
use clap::Args;
use competency_cert::error::AppError;
use competency_cert::workflows::certification::{
    CertificationSubmission, CertificationWorkflow, DepartmentId, InMemorySubmissionRepository,
    RequestContext, ReviewerRole, StandingLedger, StudentId, SubmissionRequest,
};
use competency_cert::workflows::criteria::{group, CriteriaGroup};
use competency_cert::workflows::levels::{CatalogIssue, LevelBand, LevelCatalog};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_FINAL_SCORE: u32 = 82;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Exam date set by the HOD approval (YYYY-MM-DD). Defaults to a week from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) exam_date: Option<NaiveDate>,
    /// Score recorded when the exam completes.
    #[arg(long)]
    pub(crate) final_score: Option<u32>,
}

#[derive(Args, Debug)]
pub(crate) struct LevelsArgs {
    /// Exam score to resolve
    #[arg(long)]
    pub(crate) score: u32,
    /// JSON level catalog (defaults to the built-in tiers)
    #[arg(long)]
    pub(crate) bands: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct CriteriaArgs {
    /// File with one criteria line per row
    pub(crate) path: PathBuf,
}

pub(crate) fn run_levels(args: LevelsArgs) -> Result<(), AppError> {
    let catalog = match args.bands {
        Some(path) => LevelCatalog::from_path(path)?,
        None => LevelCatalog::standard(),
    };

    print!(
        "{}",
        render_level(args.score, catalog.resolve(args.score), &catalog.issues())
    );
    Ok(())
}

pub(crate) fn run_criteria(args: CriteriaArgs) -> Result<(), AppError> {
    let raw = fs::read_to_string(&args.path)?;
    print!("{}", render_criteria(&group(&[raw])));
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let exam_date = args
        .exam_date
        .unwrap_or_else(|| Local::now().date_naive() + chrono::Duration::days(7));
    let final_score = args.final_score.unwrap_or(DEFAULT_FINAL_SCORE);

    let ledger = Arc::new(StandingLedger::new());
    let workflow = CertificationWorkflow::new(
        Arc::new(InMemorySubmissionRepository::new()),
        ledger.clone(),
        LevelCatalog::standard(),
    );
    let mut events = workflow.subscribe();
    let ctx = RequestContext::background();

    println!("Competency certification demo");
    let submitted = workflow.submit(&ctx, demo_request())?;
    print_step("Submitted", &submitted);

    let approvals = [
        (ReviewerRole::SubjectTeacher, None, None),
        (ReviewerRole::Homeroom, Some("Kehadiran praktik lengkap"), None),
        (ReviewerRole::Hod, Some("Ujian di bengkel TKR"), Some(exam_date)),
    ];
    for (role, notes, date) in approvals {
        let record = workflow.approve(&ctx, &submitted.id, role, notes, date)?;
        print_step(&format!("Approved by {}", role.label()), &record);
    }

    let completed = workflow.complete(&ctx, &submitted.id, Some(final_score))?;
    print_step("Completed", &completed);

    println!("\nNotifications");
    while let Ok(event) = events.try_recv() {
        println!(
            "  - {} {} -> {}",
            event.occurred_at.format("%H:%M:%S%.3f"),
            event.student_id,
            event.new_status
        );
    }

    if let Some(standing) = ledger.standing(&submitted.student_id) {
        println!(
            "\nStanding: score {} | tier {} | {} exam(s)",
            standing.score,
            standing
                .level
                .as_ref()
                .map(|band| band.badge_name.as_str())
                .unwrap_or("-"),
            standing.completed_exams
        );
    }

    let band = workflow.catalog().resolve(final_score);
    if let Some(band) = band {
        let groups = workflow
            .catalog()
            .criteria_groups(&completed.department_id.0, band.rank);
        println!("\nCriteria for {}", band.badge_name);
        print!("{}", render_criteria(&groups));
    }

    Ok(())
}

fn demo_request() -> SubmissionRequest {
    SubmissionRequest {
        student_id: StudentId("demo-001".to_string()),
        student_name: "Putri Maharani".to_string(),
        class_label: "XI TKR 2".to_string(),
        department_id: DepartmentId("tkr".to_string()),
        items: vec![
            "Memelihara sistem rem".to_string(),
            "Memperbaiki sistem kelistrikan".to_string(),
            "Melakukan tune up mesin bensin".to_string(),
        ],
    }
}

fn print_step(label: &str, record: &CertificationSubmission) {
    println!(
        "- {label}: {} -> {} (version {})",
        record.id, record.status, record.version
    );
    if let Some(date) = record.exam_date {
        println!("  exam date {date}");
    }
    if let Some(score) = record.final_score {
        println!("  final score {score}");
    }
}

pub(crate) fn render_level(score: u32, band: Option<&LevelBand>, issues: &[CatalogIssue]) -> String {
    let mut out = String::new();
    match band {
        Some(band) => {
            let _ = writeln!(
                out,
                "Score {score}: {} (rank {}, {}) covers {}-{}",
                band.badge_name, band.rank, band.badge_color, band.min_score, band.max_score
            );
        }
        None => {
            let _ = writeln!(out, "Score {score}: no tier configured");
        }
    }

    if !issues.is_empty() {
        let _ = writeln!(out, "Catalog issues:");
        for issue in issues {
            let _ = writeln!(out, "  - {issue}");
        }
    }
    out
}

pub(crate) fn render_criteria(groups: &[CriteriaGroup]) -> String {
    let mut out = String::new();
    for criteria in groups {
        let _ = writeln!(out, "{}", criteria.main);
        for sub in &criteria.subs {
            let _ = writeln!(out, "    - {sub}");
        }
    }
    out
}
