use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::observability::metrics::Metrics;

pub async fn enqueue_request(
    match_tx: &mpsc::Sender<Uuid>,
    metrics: &Metrics,
    request_id: Uuid,
) -> Result<(), AppError> {
    match_tx
        .send(request_id)
        .await
        .map_err(|err| AppError::Internal(format!("match queue send failed: {err}")))?;

    metrics.requests_in_queue.inc();
    Ok(())
}
