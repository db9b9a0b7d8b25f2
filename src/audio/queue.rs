use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::library::Song;

/// Motivo por el que una espera en la cola terminó sin canción.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue wait cancelled")]
    Cancelled,
    #[error("queue wait timed out")]
    TimedOut,
}

/// Cola FIFO de canciones de una guild.
///
/// Varios productores (comandos) y un único consumidor (el bucle de
/// reproducción). Todas las mutaciones pasan por el mismo lock, así que un
/// `enqueue` que compite con `shuffle` o `clear` nunca se pierde ni se duplica.
#[derive(Debug, Default)]
pub struct SongQueue {
    items: Mutex<VecDeque<Song>>,
    available: Notify,
}

impl SongQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una canción al final de la cola
    pub fn enqueue(&self, song: Song) {
        debug!("➕ Agregado a la cola: {}", song.title());
        self.items.lock().push_back(song);
        self.available.notify_one();
    }

    /// Agrega varias canciones conservando su orden
    pub fn extend(&self, songs: impl IntoIterator<Item = Song>) -> usize {
        let added = {
            let mut items = self.items.lock();
            let before = items.len();
            items.extend(songs);
            items.len() - before
        };

        if added > 0 {
            info!("➕ Agregadas {} canciones a la cola", added);
            self.available.notify_one();
        }
        added
    }

    /// Saca la primera canción sin esperar
    pub fn try_dequeue(&self) -> Option<Song> {
        self.items.lock().pop_front()
    }

    /// Espera hasta que haya una canción o se cancele el token.
    pub async fn dequeue_blocking(&self, cancel: &CancellationToken) -> Result<Song, QueueError> {
        loop {
            if let Some(song) = self.try_dequeue() {
                return Ok(song);
            }

            // `notify_one` deja un permiso si nadie espera, así que un enqueue
            // entre el pop fallido y este punto no se pierde.
            tokio::select! {
                _ = self.available.notified() => {}
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
            }
        }
    }

    /// Igual que [`Self::dequeue_blocking`], acotado por `timeout`.
    pub async fn dequeue_timeout(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<Song, QueueError> {
        match tokio::time::timeout(timeout, self.dequeue_blocking(cancel)).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::TimedOut),
        }
    }

    /// Copia de las canciones en `start..end` (limitado al tamaño actual)
    pub fn peek_range(&self, start: usize, end: usize) -> Vec<Song> {
        let items = self.items.lock();
        let end = end.min(items.len());
        if start >= end {
            return Vec::new();
        }
        items.range(start..end).cloned().collect()
    }

    /// Obtiene una página específica de la cola (páginas desde 1)
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items = self.items.lock();
        let total_items = items.len();
        let safe_page = page.max(1);
        let start = (safe_page - 1).saturating_mul(items_per_page);
        let end = start.saturating_add(items_per_page).min(total_items);
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(items_per_page)
        };

        QueuePage {
            songs: if start < end {
                items.range(start..end).cloned().collect()
            } else {
                Vec::new()
            },
            first_position: start + 1,
            current_page: safe_page,
            total_pages,
            total_items,
        }
    }

    /// Mezcla la cola
    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        let mut rng = rand::thread_rng();
        items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} canciones)", items.len());
    }

    /// Limpia la cola
    pub fn clear(&self) -> usize {
        let cleared = {
            let mut items = self.items.lock();
            let cleared = items.len();
            items.clear();
            cleared
        };
        if cleared > 0 {
            info!("🗑️ Cola limpiada: {} canciones removidas", cleared);
        }
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Duración total de lo que queda en cola
    pub fn total_duration(&self) -> Duration {
        self.items.lock().iter().map(Song::duration).sum()
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub songs: Vec<Song>,
    /// Posición (desde 1) de la primera canción de la página
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::song;
    use pretty_assertions::assert_eq;
    use std::{collections::HashSet, sync::Arc};

    fn ids(songs: &[Song]) -> Vec<u64> {
        songs.iter().map(|s| s.id().0).collect()
    }

    #[tokio::test]
    async fn test_dequeue_preserves_fifo_order() {
        let queue = SongQueue::new();
        let token = CancellationToken::new();
        for id in 1..=5 {
            queue.enqueue(song(id));
        }

        let mut out = Vec::new();
        for _ in 0..5 {
            out.push(queue.dequeue_blocking(&token).await.unwrap());
        }

        assert_eq!(ids(&out), vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_dequeue_blocks_until_enqueue() {
        let queue = Arc::new(SongQueue::new());
        let token = CancellationToken::new();
        queue.enqueue(song(1));
        queue.dequeue_blocking(&token).await.unwrap();

        let blocked = queue
            .dequeue_timeout(&token, Duration::from_secs(5))
            .await;
        assert_eq!(blocked, Err(QueueError::TimedOut));

        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            producer.enqueue(song(2));
        });

        let next = queue.dequeue_blocking(&token).await.unwrap();
        assert_eq!(next.id().0, 2);
    }

    #[tokio::test]
    async fn test_cancel_wakes_blocked_consumer() {
        let queue = Arc::new(SongQueue::new());
        let token = CancellationToken::new();

        let consumer = {
            let queue = queue.clone();
            let token = token.clone();
            tokio::spawn(async move { queue.dequeue_blocking(&token).await })
        };

        tokio::task::yield_now().await;
        token.cancel();

        assert_eq!(consumer.await.unwrap(), Err(QueueError::Cancelled));
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let queue = SongQueue::new();
        queue.extend((1..=50).map(song));

        queue.shuffle();

        let mut shuffled = ids(&queue.peek_range(0, 100));
        assert_eq!(shuffled.len(), 50);
        shuffled.sort_unstable();
        assert_eq!(shuffled, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_clear_discards_pending_songs() {
        let queue = SongQueue::new();
        let token = CancellationToken::new();
        queue.extend((1..=3).map(song));

        assert_eq!(queue.clear(), 3);
        assert_eq!(queue.len(), 0);

        queue.enqueue(song(9));
        let next = queue.dequeue_blocking(&token).await.unwrap();
        assert_eq!(next.id().0, 9);
    }

    #[test]
    fn test_page_and_peek_range() {
        let queue = SongQueue::new();
        queue.extend((1..=23).map(song));

        let page = queue.page(3, 10);
        assert_eq!(ids(&page.songs), vec![21, 22, 23]);
        assert_eq!(page.first_position, 21);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 23);

        assert!(queue.page(4, 10).songs.is_empty());
        assert_eq!(ids(&queue.peek_range(2, 5)), vec![3, 4, 5]);
        assert!(queue.peek_range(30, 40).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_lose_nothing() {
        let queue = Arc::new(SongQueue::new());
        let token = CancellationToken::new();

        let producer = |range: std::ops::RangeInclusive<u64>| {
            let queue = queue.clone();
            tokio::spawn(async move {
                for id in range {
                    queue.enqueue(song(id));
                    tokio::task::yield_now().await;
                }
            })
        };
        let first = producer(1..=200);
        let second = producer(201..=400);

        let mut seen = HashSet::new();
        for _ in 0..400 {
            let next = queue.dequeue_blocking(&token).await.unwrap();
            assert!(seen.insert(next.id().0), "duplicated song {}", next.id());
        }

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(seen, (1..=400).collect::<HashSet<_>>());
        assert!(queue.is_empty());
    }
}
