use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use gradepilot::config::{self, Config};
use gradepilot::grading::{Assignment, GradeLog, GradingSession};
use gradepilot::spinner::{Spinner, SpinnerStyle};
use gradepilot::suggest::{RequestOutcome, SuggestionRequester};

#[derive(Parser, Debug)]
#[command(
    name = "gradepilot",
    about = "AI-assisted grade suggestions for student submissions",
    version
)]
struct Args {
    /// Store a Gemini API key in the system keychain and exit
    #[arg(long)]
    setup: bool,

    /// Assignment question or rubric, inline
    #[arg(long, conflicts_with = "question_file")]
    question: Option<String>,

    /// Read the assignment question from a file
    #[arg(long, value_name = "PATH")]
    question_file: Option<PathBuf>,

    /// Student submission text, inline
    #[arg(long, conflicts_with = "submission_file")]
    submission: Option<String>,

    /// Read the student submission from a file
    #[arg(long, value_name = "PATH")]
    submission_file: Option<PathBuf>,

    /// Course id used when recording the grade
    #[arg(long, default_value_t = 1)]
    course: i64,

    /// Assignment id used when recording the grade
    #[arg(long, default_value_t = 1)]
    assignment: i64,

    /// Assignment title shown in the output
    #[arg(long, default_value = "Untitled assignment")]
    title: String,

    /// Override the final grade before recording
    #[arg(long)]
    grade: Option<String>,

    /// Override the final feedback before recording
    #[arg(long)]
    feedback: Option<String>,

    /// Record the final grade through the grade log
    #[arg(long)]
    record: bool,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.setup {
        config::setup_api_key_interactive().map_err(|err| anyhow!(err))?;
        return Ok(());
    }

    let question = text_arg(args.question.clone(), args.question_file.as_deref(), "question")?
        .ok_or_else(|| anyhow!("a question is required (--question or --question-file)"))?;
    let submission = text_arg(
        args.submission.clone(),
        args.submission_file.as_deref(),
        "submission",
    )?;

    let assignment = Assignment {
        id: args.assignment,
        course_id: args.course,
        title: args.title.clone(),
        question,
        submission_text: submission,
    };

    let mut session = GradingSession::new(assignment);

    if session.can_request_suggestion() {
        let config = Config::load();
        let requester = SuggestionRequester::from_config(&config)?;
        run_suggestion(&mut session, &requester).await;
    } else if args.grade.is_none() {
        return Err(anyhow!(
            "a non-empty submission is required (--submission or --submission-file), \
             or pass --grade to record a grade manually"
        ));
    }

    // Manual overrides are the human-edit path: they land in the same editable
    // fields a suggestion fills.
    if let Some(grade) = args.grade {
        session.grade = grade;
    }
    if let Some(feedback) = args.feedback {
        session.feedback = feedback;
    }

    if args.record {
        let mut sink = GradeLog;
        session.submit(&mut sink).context("cannot record this grade")?;
    }

    print_outcome(&session, args.record, args.json)?;
    Ok(())
}

/// Drive one suggestion request with the spinner as the pending indicator.
/// A Failed outcome is not an error here: the session absorbs its defaults.
async fn run_suggestion(session: &mut GradingSession, requester: &SuggestionRequester) {
    if !session.request_suggestion(requester) {
        return;
    }

    let mut spinner = Spinner::new(SpinnerStyle::Braille, "AI is analyzing the submission...");
    spinner.start();
    while !session.refresh() {
        spinner.tick();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    match session.outcome() {
        Some(RequestOutcome::Succeeded(_)) => spinner.finish_with_message("suggestion ready"),
        _ => spinner.stop(),
    }
}

fn text_arg(inline: Option<String>, file: Option<&Path>, what: &str) -> Result<Option<String>> {
    if let Some(text) = inline {
        return Ok(Some(text));
    }
    match file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("could not read {} file {}", what, path.display()))?;
            Ok(Some(text))
        }
        None => Ok(None),
    }
}

fn print_outcome(session: &GradingSession, recorded: bool, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::json!({
            "assignment": {
                "id": session.assignment().id,
                "courseId": session.assignment().course_id,
                "title": session.assignment().title,
            },
            "grade": session.grade,
            "feedback": session.feedback,
            "recorded": recorded,
            "outcome": session.outcome(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!();
    println!("  {}", session.assignment().title);
    if let Some(RequestOutcome::Failed { reason, .. }) = session.outcome() {
        eprintln!("  (suggestion unavailable: {})", reason);
    }
    println!("  grade:    {}", session.grade);
    println!("  feedback: {}", session.feedback);
    if recorded {
        println!("  recorded for assignment {} in course {}", session.assignment().id, session.assignment().course_id);
    }
    println!();
    Ok(())
}
