//! Operator console: line-oriented management surface over the supervisor.
//!
//! Commands:
//! - `list` (or an empty line): table of every agent
//! - `show <id>`: one agent including its last payload
//! - `start <id>` / `stop <id>`
//! - `new <name>`: read a curl definition, save it, create and start the agent
//! - `edit <id>`: replace the stored definition of an agent
//! - `help`, `quit`
//!
//! Definitions are entered line by line and terminated by a line holding a
//! single `.`.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::agent::{AgentId, AgentSnapshot};
use crate::definitions::{self, DefinitionStore};
use crate::error::{DefinitionError, Error};
use crate::supervisor::{LifecycleChange, Supervisor};

/// Terminates a multi-line definition.
pub const DEFINITION_TERMINATOR: &str = ".";

const PROMPT: &str = "fleet> ";

const HELP: &str = "\
Commands:
  list              show all agents (an empty line does the same)
  show <id>         show one agent and its last response
  start <id>        start polling
  stop <id>         stop polling
  new <name>        add an agent from a curl command, then start it
  edit <id>         replace an agent's curl command (applies on restart)
  help              this text
  quit              stop all agents and exit
";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Show(AgentId),
    Start(AgentId),
    Stop(AgentId),
    New(String),
    Edit(AgentId),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let id = || -> Result<AgentId, String> {
            if arg.is_empty() {
                return Err(format!("usage: {verb} <id>"));
            }
            arg.parse::<u64>()
                .map(AgentId)
                .map_err(|_| format!("not an agent id: {arg}"))
        };

        match verb.to_ascii_lowercase().as_str() {
            "" | "list" | "ls" => Ok(Self::List),
            "show" => id().map(Self::Show),
            "start" => id().map(Self::Start),
            "stop" => id().map(Self::Stop),
            "edit" => id().map(Self::Edit),
            "new" if arg.is_empty() => Err("usage: new <name>".to_string()),
            "new" => Ok(Self::New(arg.to_string())),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command: {other} (try 'help')")),
        }
    }
}

/// Render agents as an aligned table.
pub fn render_table(agents: &[AgentSnapshot]) -> String {
    if agents.is_empty() {
        return "No agents. Use 'new <name>' to add one.\n".to_string();
    }

    let id_width = agents
        .iter()
        .map(|a| a.id.to_string().len())
        .max()
        .unwrap_or(0);
    let name_width = agents.iter().map(|a| a.name.len()).max().unwrap_or(0);
    let score_width = agents
        .iter()
        .map(|a| a.score.to_string().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for agent in agents {
        let _ = writeln!(
            out,
            "{:>id_width$}  {:<name_width$} - {:<7} - {:>score_width$}",
            agent.id,
            agent.name,
            agent.status.to_string(),
            agent.score.to_string(),
        );
    }
    out
}

fn render_detail(agent: &AgentSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Agent {} ({})", agent.id, agent.name);
    let _ = writeln!(out, "  status:       {}", agent.status);
    let _ = writeln!(out, "  score:        {}", agent.score);
    let _ = writeln!(out, "  polls:        {}", agent.successful_polls);
    if let Some(at) = agent.started_at {
        let _ = writeln!(out, "  started:      {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(at) = agent.last_polled_at {
        let _ = writeln!(out, "  last poll:    {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if !agent.credentials_complete {
        let _ = writeln!(out, "  credentials:  incomplete (bearer or cookie missing)");
    }
    match &agent.last_payload {
        Some(payload) => {
            let pretty =
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
            let _ = writeln!(out, "  last payload:\n{pretty}");
        }
        None => {
            let _ = writeln!(out, "  last payload: none");
        }
    }
    out
}

/// Interactive console bound to a supervisor and its definition store.
pub struct Console {
    supervisor: Arc<Supervisor>,
    store: Arc<DefinitionStore>,
}

impl Console {
    pub fn new(supervisor: Arc<Supervisor>, store: Arc<DefinitionStore>) -> Self {
        Self { supervisor, store }
    }

    /// Serve commands from `reader` until `quit` or end of input.
    pub async fn run<R, W>(&self, reader: R, mut out: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        let table = render_table(&self.supervisor.list().await);
        out.write_all(table.as_bytes()).await?;
        out.write_all(PROMPT.as_bytes()).await?;
        out.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let response = match Command::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.execute(command, &mut lines, &mut out).await?,
                Err(message) => format!("{message}\n"),
            };
            out.write_all(response.as_bytes()).await?;
            out.write_all(PROMPT.as_bytes()).await?;
            out.flush().await?;
        }

        Ok(())
    }

    async fn execute<R, W>(
        &self,
        command: Command,
        lines: &mut Lines<R>,
        out: &mut W,
    ) -> std::io::Result<String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result: crate::error::Result<String> = match command {
            Command::List => Ok(render_table(&self.supervisor.list().await)),
            Command::Show(id) => self
                .supervisor
                .snapshot(id)
                .await
                .map(|snap| render_detail(&snap))
                .map_err(Error::from),
            Command::Start(id) => self
                .supervisor
                .start(id)
                .await
                .map(|change| describe(id, change))
                .map_err(Error::from),
            Command::Stop(id) => self
                .supervisor
                .stop(id)
                .await
                .map(|change| describe(id, change))
                .map_err(Error::from),
            Command::New(name) => {
                let Some(content) = read_definition(lines).await? else {
                    return Ok("Cancelled.\n".to_string());
                };
                self.add_agent(&name, &content).await
            }
            Command::Edit(id) => match self.supervisor.snapshot(id).await {
                Err(e) => Err(e.into()),
                Ok(snap) => {
                    let current = match self.store.read(&snap.name).await {
                        Ok(definition) => definition.content,
                        Err(DefinitionError::NotFound { .. }) => String::new(),
                        Err(e) => return Ok(format!("error: {}\n", Error::from(e))),
                    };
                    let header = if current.is_empty() {
                        format!("No stored definition for {}.\n", snap.name)
                    } else {
                        format!("Current definition of {}:\n{current}", snap.name)
                    };
                    let ask = format!(
                        "Enter the replacement, ending with a '{DEFINITION_TERMINATOR}' line:\n"
                    );
                    out.write_all(header.as_bytes()).await?;
                    out.write_all(ask.as_bytes()).await?;
                    out.flush().await?;

                    let Some(content) = read_definition(lines).await? else {
                        return Ok("Cancelled.\n".to_string());
                    };
                    self.store
                        .write(&snap.name, &content)
                        .await
                        .map(|()| {
                            format!(
                                "Saved definition for {}; it applies on the next restart.\n",
                                snap.name
                            )
                        })
                        .map_err(Error::from)
                }
            },
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        };

        Ok(result.unwrap_or_else(|e| format!("error: {e}\n")))
    }

    /// Persist a new definition, then create and start its agent.
    async fn add_agent(&self, name: &str, content: &str) -> crate::error::Result<String> {
        definitions::validate_name(name)?;
        if self.supervisor.find_by_name(name).await.is_some() {
            return Err(crate::error::SupervisorError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }

        self.store.write(name, content).await?;
        let id = self
            .supervisor
            .create(name, definitions::parse_credentials(content))
            .await?;
        self.supervisor.start(id).await?;
        Ok(format!("Created agent {id} ({name}) and started it.\n"))
    }
}

fn describe(id: AgentId, change: LifecycleChange) -> String {
    match change {
        LifecycleChange::Applied => format!("Agent {id}: ok\n"),
        LifecycleChange::AlreadyRunning => format!("Agent {id} is already running\n"),
        LifecycleChange::AlreadyStopped => format!("Agent {id} is already stopped\n"),
    }
}

/// Read lines up to the terminator. `None` when the input ends first or nothing was entered.
async fn read_definition<R>(lines: &mut Lines<R>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content = String::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == DEFINITION_TERMINATOR {
            return Ok((!content.trim().is_empty()).then_some(content));
        }
        content.push_str(&line);
        content.push('\n');
    }
    Ok(None)
}
