// src/adapters/adpod.rs

//! 长视频广告 pod 分组。
//!
//! 同一个 pod 的 imp id 共享 `_` 之前的前缀（例如 `1_0`、`1_1` 属于 pod `1`）。
//! 每个 pod 只生成一次 pod id，之后再按 imp 数量上限拆分，
//! 拆出来的所有请求都带同一个 pod id，一个请求也不会混入两个 pod 的 imp。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use serde_json::Value;
use tracing::debug;

use crate::adapters::split::BatchSplitter;
use crate::adapters::{AdapterError, RequestData};
use crate::openrtb::request::{BidRequest, Imp};

pub const POD_KEY_DELIMITER: char = '_';

/// pod id 来源。必须可以被多个线程同时调用。
pub trait PodIdGenerator: Send + Sync {
    fn next_pod_id(&self) -> String;
}

/// 默认实现：非负随机 i64 的十进制字符串
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPodIdGenerator;

impl PodIdGenerator for RandomPodIdGenerator {
    fn next_pod_id(&self) -> String {
        rand::thread_rng().gen_range(0..i64::MAX).to_string()
    }
}

/// 递增序列，测试里用来得到可预测的 pod id
#[derive(Debug, Default)]
pub struct SequentialPodIdGenerator {
    next: AtomicU64,
}

impl SequentialPodIdGenerator {
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl PodIdGenerator for SequentialPodIdGenerator {
    fn next_pod_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

/// imp id 中分隔符之前的部分；没有分隔符时整个 id 就是 pod key
pub fn pod_key(imp_id: &str) -> &str {
    imp_id
        .split_once(POD_KEY_DELIMITER)
        .map(|(key, _)| key)
        .unwrap_or(imp_id)
}

/// 按 pod key 分组，组的顺序为 pod key 第一次出现的顺序，组内保持原顺序
pub fn group_by_pods(imps: Vec<Imp>) -> Vec<(String, Vec<Imp>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Imp>)> = Vec::new();

    for imp in imps {
        let key = pod_key(&imp.id).to_string();
        match index.get(&key) {
            Some(&i) => groups[i].1.push(imp),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![imp]));
            }
        }
    }

    groups
}

pub struct PodGrouper<'a> {
    pod_ids: &'a dyn PodIdGenerator,
    splitter: BatchSplitter,
}

impl<'a> PodGrouper<'a> {
    pub fn new(pod_ids: &'a dyn PodIdGenerator, splitter: BatchSplitter) -> Self {
        Self { pod_ids, splitter }
    }

    /// 逐个 pod 生成 pod id，交给 `ext_for_pod` 得到该 pod 专属的请求级扩展，
    /// 再交给 [`BatchSplitter`] 拆分。某个 pod 失败不影响其它 pod。
    pub fn split<F>(
        &self,
        imps: Vec<Imp>,
        template: &BidRequest,
        uri: &str,
        mut ext_for_pod: F,
    ) -> (Vec<RequestData>, Vec<AdapterError>)
    where
        F: FnMut(&str) -> Result<Value, AdapterError>,
    {
        let groups = group_by_pods(imps);
        let mut requests = Vec::with_capacity(groups.len());
        let mut errs = Vec::new();

        for (key, group) in groups {
            let pod_id = self.pod_ids.next_pod_id();
            debug!(pod_key = %key, pod_id = %pod_id, imp_count = group.len(), "grouped ad pod");

            let result = ext_for_pod(&pod_id)
                .and_then(|ext| self.splitter.split(&group, template, Some(&ext), uri));
            match result {
                Ok(reqs) => requests.extend(reqs),
                Err(e) => errs.push(e),
            }
        }

        (requests, errs)
    }
}
