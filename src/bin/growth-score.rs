//! Growth Score terminal quiz
//!
//! Takes the growth score quiz in a terminal and sends the results to the
//! configured capture endpoint, or sends a contact enquiry directly.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use growth_score::{
    capture::{self, CaptureClient},
    driver::QuizDriver,
    engine::{IncomingMessage, Phase, QuestionView, QuizEngine, ResultView, SyncMessage, UpdateMessage},
    quiz::{category::AdviceTable, config::Questionnaire},
    session::Tunnel,
    settings::Settings,
    validation::ContactForm,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "growth-score")]
#[command(about = "Staffing Growth Score quiz in the terminal")]
struct Args {
    /// Capture endpoint; unset or containing [[FORM_ID]] runs in demo mode
    #[arg(long, env = "GROWTH_SCORE_CAPTURE_URL")]
    capture_url: Option<String>,

    /// Questionnaire JSON to use instead of the built-in questions
    #[arg(long)]
    questions: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Take the quiz (default)
    Quiz,
    /// Send a contact enquiry
    Contact {
        /// Your name
        #[arg(long)]
        name: String,
        /// Reply address
        #[arg(long)]
        email: String,
        /// Company name
        #[arg(long)]
        company: String,
        /// Your role
        #[arg(long)]
        role: String,
        /// Headcount bracket, e.g. 11-50
        #[arg(long)]
        company_size: String,
        /// What you want help with
        #[arg(long)]
        interest: String,
        /// Message
        #[arg(long)]
        message: String,
    },
}

/// Draws engine output as plain text
struct TerminalTunnel;

impl TerminalTunnel {
    fn print_question(view: &QuestionView) {
        println!();
        println!("Question {} of {}", view.index + 1, view.count);
        println!("{}", view.prompt);
        for option in &view.options {
            let marker = if view.selected == Some(option.value) {
                '*'
            } else {
                ' '
            };
            println!(" {marker} {}. {}", option.value, option.label);
        }
    }

    fn print_results(view: &ResultView) {
        println!();
        println!("Your score: {} / {}", view.score, view.max_score);
        println!("{}", view.label);
        println!("{}", view.advice);
    }
}

impl Tunnel for TerminalTunnel {
    fn send_message(&self, message: &UpdateMessage) {
        match message {
            UpdateMessage::AnswerRecorded {
                progress, complete, ..
            } => {
                println!(
                    "  {}% complete ({}/{})",
                    progress.percent_complete, progress.answered, progress.total
                );
                if *complete {
                    println!("  All answered. Type `r` to see your score.");
                }
            }
            UpdateMessage::QuestionChanged(view) => Self::print_question(view),
            UpdateMessage::Results(view) => Self::print_results(view),
            UpdateMessage::Submitting => println!("Sending..."),
            UpdateMessage::Submitted { email } => {
                println!("Check your inbox! Your detailed breakdown is headed to {email}.");
            }
            UpdateMessage::SubmissionFailed { reason } => {
                println!("Something went wrong ({reason}). Try again.");
            }
        }
    }

    fn send_state(&self, state: &SyncMessage) {
        match state {
            SyncMessage::Question { question, .. } => Self::print_question(question),
            SyncMessage::Results(view) | SyncMessage::Submitted(view) => Self::print_results(view),
        }
    }
}

const HELP: &str = "Pick 1-4, or: p = previous, n = next, r = results, q = quit";

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>> {
    println!("{text}");
    Ok(lines
        .next_line()
        .await?
        .map(|line| line.trim().to_owned()))
}

/// Returns `false` if the user quit
///
/// Input typed while an auto-advance is pending is handled right away, so a
/// quick `p` or `n` cancels the advance.
async fn answer_questions(
    driver: &mut QuizDriver<CaptureClient>,
    lines: &mut Lines<BufReader<Stdin>>,
    tunnel: &TerminalTunnel,
) -> Result<bool> {
    while driver.engine().phase() == Phase::Answering {
        let pending = driver.engine().pending_alarm().is_some();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = driver.next_alarm(tunnel), if pending => continue,
        };

        let Some(line) = line else {
            return Ok(false);
        };

        let message = match line.trim() {
            "p" => IncomingMessage::Previous,
            "n" => IncomingMessage::Next,
            "r" => IncomingMessage::ShowResults,
            "q" => return Ok(false),
            other => match (other.parse::<u8>(), driver.engine().current_question()) {
                (Ok(value), Some(question)) => IncomingMessage::Answer {
                    question: question.id,
                    value,
                },
                _ => {
                    println!("{HELP}");
                    continue;
                }
            },
        };

        if let Err(e) = driver.handle(message, tunnel) {
            println!("  {e}");
        }
    }

    Ok(true)
}

async fn run_quiz(args: &Args, settings: &Settings, client: CaptureClient) -> Result<()> {
    let questionnaire = match &args.questions {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Questionnaire::from_json(&text)?
        }
        None => Questionnaire::default(),
    };

    let engine = QuizEngine::new(questionnaire, AdviceTable::default(), settings.engine)?;
    let mut driver = QuizDriver::new(engine, client);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let tunnel = TerminalTunnel;

    println!("{}", driver.engine().questionnaire().title);
    println!("{HELP}");
    tunnel.send_state(&driver.engine().state_message());

    'session: loop {
        if !answer_questions(&mut driver, &mut lines, &tunnel).await? {
            break;
        }

        loop {
            let text = if driver.engine().is_submitted() {
                "Type `again` to retake the quiz or `q` to quit."
            } else {
                "Enter your email for the detailed breakdown (`again` to retake, `q` to quit):"
            };

            let Some(line) = prompt(&mut lines, text).await? else {
                break 'session;
            };

            match line.as_str() {
                "q" => break 'session,
                "again" => {
                    driver.restart(&tunnel);
                    continue 'session;
                }
                email if !driver.engine().is_submitted() => {
                    if let Err(e) = driver.submit_contact(email, &tunnel).await {
                        if !e.is_recoverable() {
                            println!("  {e}");
                        }
                    }
                }
                _ => {}
            }
        }
    }

    driver.dispose();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::from_env().context("reading GROWTH_SCORE_* settings")?;
    if let Some(url) = &args.capture_url {
        settings.capture_url.clone_from(url);
    }

    let client = CaptureClient::from_settings(&settings)?;
    info!(demo = client.endpoint().is_demo(), "capture client ready");

    match &args.command {
        None | Some(Command::Quiz) => run_quiz(&args, &settings, client).await,
        Some(Command::Contact {
            name,
            email,
            company,
            role,
            company_size,
            interest,
            message,
        }) => {
            let form = ContactForm {
                name: name.clone(),
                email: email.clone(),
                company: company.clone(),
                role: role.clone(),
                company_size: company_size.clone(),
                interest: interest.clone(),
                message: message.clone(),
            };

            capture::send_contact_form(&client, form).await?;
            println!("Message sent! We'll get back to you within 24 hours.");
            Ok(())
        }
    }
}
