//! In-memory topic store
//!
//! [`MemoryTopicStore`] keeps topics, partitions and records in memory and
//! implements [`MessageSearcher`] over them, so the console can serve the
//! messages socket without a cluster behind it (demo mode, tests).
//!
//! A search reports three phases and then fans out to one worker task per
//! selected partition. Workers share the session's sink, so their messages
//! interleave on the wire in arrival order.

use crate::error::{ConsoleError, Result};
use crate::search::{
    MessageSearcher, PartitionSelector, ProgressSink, SearchRequest, SinkError, StartOffset,
    TopicMessage,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Topics created in demo mode: (name, partition count, records per partition)
pub const DEMO_TOPICS: &[(&str, i32, usize)] = &[("orders", 3, 200), ("payments", 1, 120), ("audit-log", 1, 60)];

pub const PHASE_GET_PARTITIONS: &str = "Get Partitions";
pub const PHASE_CALCULATE_REQUESTS: &str = "Get Watermarks and calculate consuming requests";
pub const PHASE_CONSUMING: &str = "Consuming messages";

/// Offset range to read from one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeRequest {
    pub partition_id: i32,
    pub start_offset: i64,
    pub end_offset: i64,
}

impl ConsumeRequest {
    pub fn len(&self) -> usize {
        (self.end_offset - self.start_offset).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory topic store
#[derive(Debug, Default)]
pub struct MemoryTopicStore {
    topics: RwLock<HashMap<String, Vec<Vec<TopicMessage>>>>,
}

impl MemoryTopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with [`DEMO_TOPICS`]
    pub fn with_demo_topics() -> Result<Self> {
        let store = Self::new();
        for (name, partitions, records) in DEMO_TOPICS {
            store.create_topic(name, *partitions)?;
            for partition in 0..*partitions {
                for seq in 0..*records {
                    let key = format!("{}-{}-{}", name, partition, seq);
                    let value = serde_json::json!({
                        "id": seq,
                        "partition": partition,
                        "source": "demo",
                    });
                    store.produce(name, partition, Some(key.as_bytes()), value.to_string().as_bytes())?;
                }
            }
            info!(topic = %name, partitions = partitions, records = records, "Created demo topic");
        }
        Ok(store)
    }

    pub fn create_topic(&self, name: &str, partitions: i32) -> Result<()> {
        if name.is_empty() {
            return Err(ConsoleError::Config("topic name must not be empty".to_string()));
        }
        if partitions <= 0 {
            return Err(ConsoleError::Config(format!(
                "topic '{}' must have at least one partition",
                name
            )));
        }
        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Err(ConsoleError::Config(format!("topic '{}' already exists", name)));
        }
        topics.insert(name.to_string(), vec![Vec::new(); partitions as usize]);
        Ok(())
    }

    /// Append a record, returning its offset
    pub fn produce(&self, topic: &str, partition: i32, key: Option<&[u8]>, value: &[u8]) -> Result<i64> {
        let mut topics = self.topics.write();
        let partitions = topics
            .get_mut(topic)
            .ok_or_else(|| ConsoleError::TopicNotFound(topic.to_string()))?;
        let records = usize::try_from(partition)
            .ok()
            .and_then(|p| partitions.get_mut(p))
            .ok_or_else(|| ConsoleError::PartitionNotFound(topic.to_string(), partition))?;

        let offset = records.len() as i64;
        let timestamp = chrono::Utc::now().timestamp_millis();
        records.push(TopicMessage::from_raw(topic, partition, offset, timestamp, key, value));
        Ok(offset)
    }

    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Low and high watermark of a partition
    pub fn watermarks(&self, topic: &str, partition: i32) -> Result<(i64, i64)> {
        let topics = self.topics.read();
        let partitions = topics
            .get(topic)
            .ok_or_else(|| ConsoleError::TopicNotFound(topic.to_string()))?;
        let records = usize::try_from(partition)
            .ok()
            .and_then(|p| partitions.get(p))
            .ok_or_else(|| ConsoleError::PartitionNotFound(topic.to_string(), partition))?;
        Ok((0, records.len() as i64))
    }

    fn partition_ids(&self, request: &SearchRequest) -> Result<Vec<i32>> {
        let topics = self.topics.read();
        let partitions = topics
            .get(request.topic_name())
            .ok_or_else(|| ConsoleError::TopicNotFound(request.topic_name().to_string()))?;
        match request.partitions() {
            PartitionSelector::All => Ok((0..partitions.len() as i32).collect()),
            PartitionSelector::One(id) if (id as usize) < partitions.len() => Ok(vec![id]),
            PartitionSelector::One(id) => Err(ConsoleError::PartitionNotFound(
                request.topic_name().to_string(),
                id,
            )),
        }
    }

    /// Split the result budget across partitions and resolve start offsets
    pub fn consume_requests(&self, request: &SearchRequest, partition_ids: &[i32]) -> Result<Vec<ConsumeRequest>> {
        if partition_ids.is_empty() {
            return Ok(Vec::new());
        }
        let max_results = i64::from(request.max_results());
        let per_partition = (max_results + partition_ids.len() as i64 - 1) / partition_ids.len() as i64;
        let mut remaining = max_results;

        let mut requests = Vec::with_capacity(partition_ids.len());
        for &partition_id in partition_ids {
            let (low, high) = self.watermarks(request.topic_name(), partition_id)?;
            let budget = per_partition.min(remaining);
            let start_offset = match request.start() {
                StartOffset::Newest => (high - budget).max(low),
                StartOffset::Oldest => low,
                StartOffset::At(offset) => offset.clamp(low, high),
            };
            let end_offset = (start_offset + budget).min(high);
            let req = ConsumeRequest {
                partition_id,
                start_offset,
                end_offset,
            };
            remaining -= req.len() as i64;
            requests.push(req);
        }
        Ok(requests)
    }

    fn read_range(&self, topic: &str, req: &ConsumeRequest) -> Vec<TopicMessage> {
        let topics = self.topics.read();
        topics
            .get(topic)
            .and_then(|partitions| partitions.get(req.partition_id as usize))
            .map(|records| {
                let start = req.start_offset.max(0) as usize;
                let end = (req.end_offset.max(0) as usize).min(records.len());
                records.get(start..end).map(<[TopicMessage]>::to_vec).unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

/// Emit one partition's messages, stopping on cancellation
async fn consume_partition(
    messages: Vec<TopicMessage>,
    cancel: CancellationToken,
    sink: Arc<dyn ProgressSink>,
) -> std::result::Result<usize, SinkError> {
    let mut sent = 0;
    for message in messages {
        if cancel.is_cancelled() {
            break;
        }
        sink.emit_message(message).await?;
        sent += 1;
        tokio::task::yield_now().await;
    }
    Ok(sent)
}

#[async_trait]
impl MessageSearcher for MemoryTopicStore {
    async fn search(
        &self,
        cancel: CancellationToken,
        request: &SearchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<()> {
        sink.emit_phase(PHASE_GET_PARTITIONS).await?;
        let partition_ids = self.partition_ids(request)?;

        sink.emit_phase(PHASE_CALCULATE_REQUESTS).await?;
        let requests = self.consume_requests(request, &partition_ids)?;

        sink.emit_phase(PHASE_CONSUMING).await?;
        let mut workers = JoinSet::new();
        for req in requests.iter().filter(|r| !r.is_empty()) {
            let messages = self.read_range(request.topic_name(), req);
            workers.spawn(consume_partition(messages, cancel.clone(), sink.clone()));
        }

        let mut total = 0;
        let mut closed = false;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(sent)) => total += sent,
                Ok(Err(SinkError::Terminated)) => {}
                Ok(Err(SinkError::Closed)) => closed = true,
                Err(e) => warn!(error = %e, "Partition consumer task failed"),
            }
        }

        debug!(
            topic = %request.topic_name(),
            partitions = requests.len(),
            messages = total,
            "Partition consumers finished"
        );

        if closed && !cancel.is_cancelled() {
            return Err(SinkError::Closed.into());
        }
        Ok(())
    }
}
