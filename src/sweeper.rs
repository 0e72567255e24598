use std::sync::Arc;
use std::time::Duration;

use async_std::task::{self, JoinHandle};
use chrono::Utc;
use futures::channel::oneshot;
use futures::future::{self, Either};
use log::*;

use crate::store::Store;
use crate::votes;

/**
 * Handle on the background task which periodically invalidates expired votes
 *
 * Dropping the handle stops the task as well
 */
pub struct Sweeper {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn spawn(store: Arc<dyn Store>, interval: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = task::spawn(async move {
            info!("Sweeping expired votes every {:?}", interval);
            loop {
                let tick = Box::pin(task::sleep(interval));
                match future::select(tick, &mut stopped).await {
                    Either::Left(_) => {
                        /*
                         * Errors are logged and the next tick tries again
                         */
                        if let Err(err) = votes::sweep_expired(store.as_ref(), Utc::now()).await {
                            error!("Background sweep failed: {:?}", err);
                        }
                    }
                    Either::Right(_) => break,
                }
            }
            debug!("Background sweep stopped");
        });

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /**
     * Signal the task and wait for it to finish
     */
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
