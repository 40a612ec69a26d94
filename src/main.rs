use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod backend;
mod error;
mod export;
mod grouping;
mod logging;
mod models;
mod render;
mod session;
mod tags;
mod visibility;

use backend::HttpBackend;
use export::pagination::PageLayout;
use export::pdf::FontConfig;
use export::{SnapshotFile, NOTHING_VISIBLE};
use models::{Goal, SortOrder, Student};
use render::ReportView;
use session::Session;

#[derive(Parser)]
#[command(name = "observation-report")]
#[command(about = "Classroom observation notes and per-student reports", long_about = None)]
struct Cli {
    /// Tracker backend endpoint
    #[arg(long, env = "OBSERVATION_API_URL", global = true)]
    api_url: Option<String>,
    /// Bearer credential sent with every request
    #[arg(long, env = "OBSERVATION_ID_TOKEN", global = true, hide_env_values = true)]
    id_token: Option<String>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List students, optionally filtered by name
    Students {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        include_inactive: bool,
        #[arg(long, value_enum, default_value_t = SortOrder::LastUpdated)]
        sort: SortOrder,
    },
    /// List the global tags
    Tags {
        /// Show every tag with its description instead of the first few
        #[arg(long)]
        all: bool,
    },
    /// Show a student's grouped report
    Report {
        #[arg(long)]
        student: String,
        /// Only groups containing this tag id
        #[arg(long)]
        tag: Option<String>,
        /// Expand a collapsed group by name
        #[arg(long)]
        expand: Vec<String>,
        /// Include entries hidden from the report
        #[arg(long)]
        show_hidden: bool,
    },
    /// Write the plain-text transcript of a report
    Text {
        #[arg(long)]
        student: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Lay a fully expanded report snapshot out as a letter-size PDF
    Pdf {
        #[arg(long)]
        student: String,
        /// PNG capture of the rendered report. Capture it with every group
        /// expanded and hidden entries left out; the file is used as given.
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value = "./fonts")]
        font_dir: PathBuf,
        #[arg(long, default_value = "LiberationSans")]
        font_family: String,
    },
    /// Record an observation
    Note {
        #[arg(long)]
        student: String,
        /// Goal id or title
        #[arg(long)]
        goal: Option<String>,
        /// Tag id, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, env = "OBSERVATION_AUTHOR")]
        author: String,
        note: String,
    },
    /// Hide an observation from the report
    Hide {
        #[arg(long)]
        student: String,
        observation: String,
    },
    /// Show a hidden observation in the report again
    Unhide {
        #[arg(long)]
        student: String,
        observation: String,
    },
    /// Permanently delete an observation
    Delete {
        #[arg(long)]
        student: String,
        observation: String,
        #[arg(long)]
        yes: bool,
    },
    /// Create a student
    AddStudent {
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        #[arg(long, default_value = "")]
        grade: String,
        #[arg(long)]
        inactive: bool,
    },
    /// Create a goal for a student
    AddGoal {
        #[arg(long)]
        student: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "Academic")]
        category: String,
        #[arg(long)]
        inactive: bool,
    },
    /// Create a global tag
    AddTag {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

async fn open_session(cli: &Cli) -> anyhow::Result<Session<HttpBackend>> {
    let api_url = cli
        .api_url
        .clone()
        .context("OBSERVATION_API_URL must be set to the tracker backend endpoint")?;
    let mut session = Session::new(HttpBackend::new(api_url, cli.id_token.clone()));
    session
        .load_initial_data()
        .await
        .context("failed to load students and tags")?;
    Ok(session)
}

fn require_observation(
    session: &Session<HttpBackend>,
    observation_id: &str,
) -> anyhow::Result<()> {
    if session
        .observations()
        .iter()
        .any(|observation| observation.observation_id == observation_id)
    {
        Ok(())
    } else {
        anyhow::bail!("no observation {observation_id} for this student")
    }
}

async fn open_student(session: &mut Session<HttpBackend>, query: &str) -> anyhow::Result<()> {
    let student_id = session
        .find_student(query)
        .map(|student| student.student_id.clone())
        .with_context(|| format!("no student matches {query:?}"))?;
    session.select_student(&student_id).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json)?;
    let mut session = open_session(&cli).await?;

    match cli.command {
        Commands::Students {
            search,
            include_inactive,
            sort,
        } => {
            session.set_sort_order(sort).await?;
            session.set_show_inactive(include_inactive);
            let students = session.search_students(search.as_deref().unwrap_or_default());
            if students.is_empty() {
                println!("No students found.");
                return Ok(());
            }
            for student in students {
                let status = if student.active { "" } else { " (inactive)" };
                println!(
                    "{}  {} (Grade: {}){}",
                    student.student_id,
                    student.full_name(),
                    student.grade_level,
                    status
                );
            }
        }
        Commands::Tags { all: true } => {
            for tag in session.tags() {
                if tag.description.is_empty() {
                    println!("{}  {}", tag.tag_id, tag.name);
                } else {
                    println!("{}  {}: {}", tag.tag_id, tag.name, tag.description);
                }
            }
        }
        Commands::Tags { all: false } => {
            let strip = session.tag_chips(false);
            for chip in &strip.chips {
                println!("{}  {}", chip.tag_id, chip.name);
            }
            if let Some(total) = strip.show_all {
                println!("Show All {total} (--all)");
            }
        }
        Commands::Report {
            student,
            tag,
            expand,
            show_hidden,
        } => {
            open_student(&mut session, &student).await?;
            for group in &expand {
                session.toggle_group(group);
            }
            session.set_show_hidden(show_hidden);
            if let Some(tag_id) = &tag {
                session.filter_by_tag(tag_id);
                let no_matches = matches!(
                    session.report_view(),
                    ReportView::Groups { groups, .. } if groups.is_empty()
                );
                if no_matches {
                    println!("No entries tagged {tag_id}; showing the full report.");
                    session.reset_filter();
                    for group in &expand {
                        session.toggle_group(group);
                    }
                }
            }
            if let Some(selected) = session.selected_student() {
                println!("Report for {}", selected.full_name());
            }
            print!("{}", session.report_view());
        }
        Commands::Text { student, out } => {
            open_student(&mut session, &student).await?;
            let Some(text) = session.plain_text()? else {
                println!("{NOTHING_VISIBLE}");
                return Ok(());
            };
            match out {
                Some(path) => {
                    tokio::fs::write(&path, text)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{text}"),
            }
        }
        Commands::Pdf {
            student,
            snapshot,
            out_dir,
            font_dir,
            font_family,
        } => {
            open_student(&mut session, &student).await?;
            let fonts = FontConfig {
                dir: font_dir,
                family: font_family,
            };
            let generated = chrono::Local::now().date_naive();
            let document = session
                .export_pdf(
                    &SnapshotFile::new(snapshot),
                    generated,
                    &PageLayout::default(),
                    &fonts,
                )
                .await
                .context("PDF export failed")?;
            let Some(document) = document else {
                println!("{NOTHING_VISIBLE}");
                return Ok(());
            };
            let path = out_dir.join(&document.file_name);
            std::fs::write(&path, &document.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "PDF written to {} ({} pages).",
                path.display(),
                document.pages
            );
        }
        Commands::Note {
            student,
            goal,
            tags,
            author,
            note,
        } => {
            open_student(&mut session, &student).await?;
            if let Some(goal) = &goal {
                let goal_id = session
                    .goals()
                    .iter()
                    .find(|candidate| &candidate.goal_id == goal || &candidate.title == goal)
                    .map(|candidate| candidate.goal_id.clone())
                    .with_context(|| format!("no goal matches {goal:?}"))?;
                session.select_goal(&goal_id);
            }
            for tag_id in &tags {
                session.toggle_tag_selection(tag_id);
            }
            if session.submit_observation(&note, &author).await? {
                println!("Observation saved.");
            } else {
                println!("Nothing to save: the note is empty.");
            }
        }
        Commands::Hide {
            student,
            observation,
        } => {
            open_student(&mut session, &student).await?;
            require_observation(&session, &observation)?;
            session.set_hidden(&observation, true).await?;
            println!("Observation {observation} hidden from the report.");
        }
        Commands::Unhide {
            student,
            observation,
        } => {
            open_student(&mut session, &student).await?;
            require_observation(&session, &observation)?;
            session.set_hidden(&observation, false).await?;
            println!("Observation {observation} shown in the report.");
        }
        Commands::Delete {
            student,
            observation,
            yes,
        } => {
            if !yes {
                anyhow::bail!("pass --yes to permanently delete observation {observation}");
            }
            open_student(&mut session, &student).await?;
            require_observation(&session, &observation)?;
            session.delete_observation(&observation).await?;
            println!("Observation {observation} deleted.");
        }
        Commands::AddStudent {
            first,
            last,
            grade,
            inactive,
        } => {
            let saved = session
                .save_student(Student {
                    student_id: String::new(),
                    first_name: first,
                    last_name: last,
                    grade_level: grade,
                    active: !inactive,
                })
                .await?;
            println!("{}", saved.message);
        }
        Commands::AddGoal {
            student,
            title,
            description,
            category,
            inactive,
        } => {
            open_student(&mut session, &student).await?;
            session
                .save_goal(Goal {
                    goal_id: String::new(),
                    student_id: String::new(),
                    title,
                    description,
                    category,
                    active: !inactive,
                })
                .await?;
            println!("Goal saved.");
        }
        Commands::AddTag { name, description } => {
            let tag = session.save_tag(&name, &description).await?;
            println!("Tag {} created ({}).", tag.name, tag.tag_id);
        }
    }

    Ok(())
}
