use facegate_core::{AnalyzedFace, FaceEngine};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("{0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Engine(#[from] facegate_core::EngineError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Where the engine thread should read the image from.
#[derive(Debug)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Analyze {
        source: ImageSource,
        limit: Option<usize>,
        reply: oneshot::Sender<Result<Vec<AnalyzedFace>, AnalyzeError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode the image, detect faces and encode up to `limit` of them.
    pub async fn analyze(
        &self,
        source: ImageSource,
        limit: Option<usize>,
    ) -> Result<Vec<AnalyzedFace>, AnalyzeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                source,
                limit,
                reply: reply_tx,
            })
            .await
            .map_err(|_| AnalyzeError::ChannelClosed)?;
        reply_rx.await.map_err(|_| AnalyzeError::ChannelClosed)?
    }
}

/// Run the engine on a dedicated OS thread.
///
/// Inference sessions need exclusive access, so every request is served in
/// arrival order by this one thread. Image decoding happens here as well to
/// keep CPU-heavy work off the async runtime.
pub fn spawn_engine<E>(mut engine: E) -> std::io::Result<EngineHandle>
where
    E: FaceEngine + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { source, limit, reply } => {
                        let result = run_analyze(&mut engine, source, limit);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn run_analyze<E: FaceEngine>(
    engine: &mut E,
    source: ImageSource,
    limit: Option<usize>,
) -> Result<Vec<AnalyzedFace>, AnalyzeError> {
    let image = match source {
        ImageSource::Bytes(bytes) => facegate_core::load_image_bytes(&bytes)?,
        ImageSource::File(path) => facegate_core::load_image_file(&path)?,
    };
    let started = std::time::Instant::now();
    let faces = facegate_core::face_encodings(engine, &image, limit)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        faces = faces.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "analyzed image"
    );
    Ok(faces)
}
