//! Command execution
//!
//! Each [`Command`] runs against a [`ClientApi`] and settles into at most
//! one [`Msg`]. The live console spawns one task per command; tests drive
//! the same code synchronously with [`run_to_idle`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ms_artifacts::{merge_listings, normalize_artifacts, write_export};
use ms_client_api::{ClientApi, ClientApiError, ClientApiResult, SessionContext};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::assistant::{AssistantAnswer, AssistantRequest};
use crate::model::Model;
use crate::msg::{Command, Msg, NetMsg};
use crate::wizard::artifact_fetch_types;

/// A request was rejected with 401
struct Expired;

/// User-facing text for a failed call
pub fn describe(err: &ClientApiError) -> String {
    match err {
        ClientApiError::Server(message) | ClientApiError::Unexpected(message) => message.clone(),
        ClientApiError::Schema(reason) => format!("Unexpected response from server: {reason}"),
        ClientApiError::Unauthorized => "Not authorized".to_string(),
    }
}

fn settle<T>(result: ClientApiResult<T>) -> Result<Result<T, String>, Expired> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(ClientApiError::Unauthorized) => Err(Expired),
        Err(e) => {
            error!(error = %e, "request failed");
            Ok(Err(describe(&e)))
        }
    }
}

/// Run one command to completion
pub async fn execute<C>(
    client: &C,
    session: &SessionContext,
    export_dir: &Path,
    command: Command,
) -> Option<Msg>
where
    C: ClientApi + ?Sized,
{
    match run(client, session, export_dir, command).await {
        Ok(net) => net.map(Msg::Net),
        Err(Expired) => {
            session.expire();
            Some(Msg::Net(NetMsg::SessionExpired))
        }
    }
}

async fn run<C>(
    client: &C,
    session: &SessionContext,
    export_dir: &Path,
    command: Command,
) -> Result<Option<NetMsg>, Expired>
where
    C: ClientApi + ?Sized,
{
    debug!(command = command.name(), "executing command");
    let net = match command {
        Command::Login(request) => {
            let token = match client.login(&request).await {
                Ok(token) => token,
                Err(ClientApiError::Unauthorized) => {
                    return Ok(Some(NetMsg::SignedIn(Err("Incorrect email or password".into()))));
                }
                Err(e) => return Ok(Some(NetMsg::SignedIn(Err(describe(&e))))),
            };
            session.login(token.access_token);
            load_user(client, session).await?
        }
        Command::LoadCurrentUser => load_user(client, session).await?,
        Command::LoadDataSources => NetMsg::DataSources(settle(client.list_data_sources().await)?),
        Command::LoadDatabases { data_source_id } => NetMsg::Databases {
            data_source_id,
            result: settle(client.list_databases(data_source_id).await)?,
        },
        Command::LoadArtifacts {
            data_source_id,
            source_type,
            db,
        } => {
            let fetches = artifact_fetch_types(&source_type)
                .iter()
                .map(|category| client.fetch_artifacts(data_source_id, &db, category));
            let payloads = settle(futures::future::try_join_all(fetches).await)?;
            let result = payloads.map(|payloads| merge_listings(payloads.iter(), &source_type));
            NetMsg::Artifacts {
                data_source_id,
                db,
                result,
            }
        }
        Command::SubmitScan(config) => NetMsg::ScanSubmitted(
            settle(client.submit_scan(&config).await)?.map(|created| created.job_id),
        ),
        Command::LoadScanJobs => NetMsg::ScanJobs(settle(client.list_scan_jobs().await)?),
        Command::LoadScanResult { job_id } => NetMsg::ScanResult {
            job_id,
            result: settle(client.get_scan_result(job_id).await)?,
        },
        Command::CreateDataSource(draft) => {
            NetMsg::DataSourceSaved(settle(client.create_data_source(&draft).await)?)
        }
        Command::UpdateDataSource { id, draft } => {
            NetMsg::DataSourceSaved(settle(client.update_data_source(id, &draft).await)?)
        }
        Command::DeleteDataSource { id } => NetMsg::DataSourceDeleted {
            id,
            result: settle(client.delete_data_source(id).await)?,
        },
        Command::TestConnection { id } => NetMsg::ConnectionTested {
            id,
            result: settle(client.test_connection(id).await)?.map(|r| r.status()),
        },
        Command::QuickScan { id, source_type } => NetMsg::QuickScanned {
            id,
            result: settle(client.quick_scan(id).await)?
                .map(|r| normalize_artifacts(Some(&r.metadata), &source_type)),
        },
        Command::Ask(request) => {
            let cancel = request.cancel.clone();
            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(request_id = request.id, "assistant question cancelled");
                    return Ok(None);
                }
                answer = ask_with_fallback(client, &request) => answer,
            };
            NetMsg::Answered {
                request_id: request.id,
                result: settle(answer)?,
            }
        }
        Command::Export { format, table } => {
            let dir = export_dir.to_path_buf();
            let written = tokio::task::spawn_blocking(move || write_export(&table, format, &dir))
                .await
                .map_err(|e| e.to_string())
                .and_then(|result| result.map_err(|e| e.to_string()));
            if let Err(message) = &written {
                warn!(%format, error = %message, "export failed");
            }
            NetMsg::Exported(written)
        }
    };
    Ok(Some(net))
}

async fn load_user<C>(client: &C, session: &SessionContext) -> Result<NetMsg, Expired>
where
    C: ClientApi + ?Sized,
{
    let user = settle(client.current_user().await)?;
    if let Ok(user) = &user {
        session.set_user(user.clone());
    }
    Ok(NetMsg::SignedIn(user))
}

/// Retrieval first; the agent answers when retrieval comes back empty
async fn ask_with_fallback<C>(
    client: &C,
    request: &AssistantRequest,
) -> ClientApiResult<AssistantAnswer>
where
    C: ClientApi + ?Sized,
{
    let rag = client.rag_query(&request.rag).await?;
    if !rag.answer.trim().is_empty() {
        return Ok(AssistantAnswer::Rag {
            answer: rag.answer,
            sources: rag.sources,
        });
    }
    debug!(request_id = request.id, "retrieval had no answer, asking the agent");
    let agent = client.ask(&request.ask).await?;
    Ok(AssistantAnswer::Agent {
        answer: agent.answer,
        context_summary: agent.context_summary,
    })
}

/// Spawns commands and posts their results to the event channel
#[derive(Clone)]
pub struct Runtime {
    client: Arc<dyn ClientApi>,
    session: SessionContext,
    export_dir: PathBuf,
    sender: mpsc::UnboundedSender<Msg>,
}

impl Runtime {
    pub fn new(
        client: Arc<dyn ClientApi>,
        session: SessionContext,
        export_dir: PathBuf,
        sender: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        Self {
            client,
            session,
            export_dir,
            sender,
        }
    }

    pub fn dispatch(&self, commands: Vec<Command>) {
        for command in commands {
            self.spawn(command);
        }
    }

    fn spawn(&self, command: Command) {
        let runtime = self.clone();
        tokio::spawn(async move {
            let msg = execute(
                runtime.client.as_ref(),
                &runtime.session,
                &runtime.export_dir,
                command,
            )
            .await;
            if let Some(msg) = msg {
                // The receiver is gone only when the app is shutting down
                let _ = runtime.sender.send(msg);
            }
        });
    }
}

/// Execute commands one at a time, feeding every result back into the
/// model, until nothing is left to do
pub async fn run_to_idle<C>(model: &mut Model, client: &C, export_dir: &Path, commands: Vec<Command>)
where
    C: ClientApi + ?Sized,
{
    let session = model.session().clone();
    let mut queue: VecDeque<Command> = commands.into();
    while let Some(command) = queue.pop_front() {
        if let Some(msg) = execute(client, &session, export_dir, command).await {
            queue.extend(model.update(msg));
        }
    }
}
