use stereo_index::challenge::{Challenge, ChallengeStore};
use stereo_index::chiral::chiral_centers;
use stereo_index::config::IndexConfig;
use stereo_index::error::Error;
use stereo_index::molecule::{Atom, Bond, Molecule};
use stereo_index::store::MoleculeStore;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hyper::service::{make_service_fn, service_fn};
use hyper::server::Server;
use hyper::{Body, Method, Request, Response, StatusCode};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const START_ATTEMPTS: usize = 5;
const MIN_CENTERS: usize = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serves random molecules and stereocenter grid challenges", long_about = None)]
struct Args {

    #[arg(short, long)]
    source: PathBuf,

    //defaults to the source path with an .index extension
    #[arg(short, long)]
    index: Option<PathBuf>,

    #[arg(short, long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    //seconds a challenge stays answerable
    #[arg(long, default_value_t = 600)]
    ttl_secs: u64,
}

struct AppState {
    store: MoleculeStore,
    challenges: ChallengeStore,
}

#[derive(Serialize, Debug)]
struct MoleculeView {
    name: String,
    offset: u64,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    chiral_centers: Vec<usize>,
}

impl MoleculeView {

    fn new(offset: u64, mol: &Molecule, chiral_centers: Vec<usize>) -> Self {

        return Self {
            name: mol.name.clone(),
            offset,
            atoms: mol.atoms().to_vec(),
            bonds: mol.bonds().to_vec(),
            chiral_centers,
        }
    }
}

#[derive(Serialize, Debug)]
struct StartResponse {
    uuid: String,
    regions: Vec<String>,
    molecule: MoleculeView,
}

#[derive(Deserialize, Debug)]
struct VerifyRequest {
    uuid: String,
    selections: Vec<String>,
}

#[derive(Serialize, Debug)]
struct VerifyResponse {
    success: bool,
    message: String,
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {

    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response.headers_mut().insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/json"));
            response
        },
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, &format!("failed to encode response: {}", e)),
    }
}

fn text(status: StatusCode, message: &str) -> Response<Body> {

    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;

    return response;
}

/// A random indexed molecule with its stereocenters. Reads hit the disk, so they run off the
/// async threads.
async fn random_molecule(state: &Arc<AppState>) -> Result<(u64, Molecule, Vec<usize>), Error> {

    let state = state.clone();

    tokio::task::spawn_blocking(move || {
        let (offset, mut mol) = state.store.random()?;
        let centers = chiral_centers(&mut mol);
        Ok::<_, Error>((offset, mol, centers))
    })
    .await?
}

async fn handle_random(state: Arc<AppState>) -> Response<Body> {

    match random_molecule(&state).await {
        Ok((offset, mol, centers)) => json(StatusCode::OK, &MoleculeView::new(offset, &mol, centers)),
        Err(Error::EmptyIndex) => text(StatusCode::SERVICE_UNAVAILABLE, "index is empty"),
        Err(e) => {
            warn!("random molecule failed: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "failed to read molecule")
        },
    }
}

async fn handle_start(state: Arc<AppState>) -> Response<Body> {

    let mut picked: Option<(u64, Molecule, Vec<usize>)> = None;

    for attempt in 0..START_ATTEMPTS {

        match random_molecule(&state).await {
            Ok((offset, mol, centers)) if centers.len() >= MIN_CENTERS => {
                picked = Some((offset, mol, centers));
                break;
            },
            Ok((offset, _, centers)) => debug!("attempt {}: offset {} has only {} centers", attempt, offset, centers.len()),
            Err(e) => warn!("attempt {}: {}", attempt, e),
        }
    }

    let (offset, mol, centers) = match picked {
        Some(picked) => picked,
        None => return text(StatusCode::INTERNAL_SERVER_ERROR, "not enough chiral carbons, try again"),
    };

    let challenge = match Challenge::new(&mol, &centers) {
        Ok(challenge) => challenge,
        Err(e) => return text(StatusCode::INTERNAL_SERVER_ERROR, &format!("failed to lay out challenge: {}", e)),
    };

    let regions = challenge.regions.clone();
    let id = state.challenges.insert(challenge);
    info!("challenge {} from offset {}", id, offset);

    let response = StartResponse {
        uuid: id,
        regions,
        molecule: MoleculeView::new(offset, &mol, centers),
    };

    json(StatusCode::OK, &response)
}

async fn handle_verify(req: Request<Body>, state: Arc<AppState>) -> Response<Body> {

    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(_) => return text(StatusCode::BAD_REQUEST, "unreadable body"),
    };

    let request: VerifyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return text(StatusCode::BAD_REQUEST, "invalid json"),
    };

    match state.challenges.verify(&request.uuid, &request.selections) {
        Some(true) => json(StatusCode::OK, &VerifyResponse { success: true, message: "verification passed".to_string() }),
        Some(false) => json(StatusCode::OK, &VerifyResponse { success: false, message: "verification failed".to_string() }),
        None => text(StatusCode::NOT_FOUND, "uuid not found"),
    }
}

async fn route(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, Infallible> {

    debug!("{} {}", req.method(), req.uri().path());

    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/api/molecule/random") => handle_random(state).await,
        (&Method::GET, "/api/challenge/start") => handle_start(state).await,
        (&Method::POST, "/api/challenge/verify") => handle_verify(req, state).await,
        _ => text(StatusCode::NOT_FOUND, "route not recognized"),
    };

    Ok(response)
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let index = args.index.clone().unwrap_or_else(|| IndexConfig::for_source(&args.source).index);

    let store = MoleculeStore::open(&args.source, &index)?;
    info!("loaded {} offsets from {:?}", store.index().len(), index);

    let state = Arc::new(AppState {
        store,
        challenges: ChallengeStore::new(Duration::from_secs(args.ttl_secs)),
    });

    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                route(req, state)
            }))
        }
    });

    let server = Server::bind(&args.bind).serve(make_svc);

    println!("Listening on http://{}", args.bind);

    server.await?;

    Ok(())
}
