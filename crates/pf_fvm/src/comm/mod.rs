// crates/pf_fvm/src/comm/mod.rs

//! 显式通信上下文
//!
//! 并行 / 串行的区别是构造期配置，而不是散落在代码各处的全局查询：
//! 需要通信的组件（矩阵求解、边界条件派发）在构造或调用时接受
//! [`CommContext`] 引用。
//!
//! # 模型
//!
//! 数据并行的域分解：每个逻辑分区一个 rank，本实现以进程内线程承载
//! 分区，分区对之间用有缓冲的配对通道交换消息。
//!
//! - `send` 不阻塞（缓冲通道），因此"先提交全部发送、再等待接收"的
//!   配对非阻塞模式天然无死锁
//! - `recv` 阻塞到消息到达，校验标签与长度，不匹配即致命错误
//! - 全局归约（点积、残差范数）经由代际计数的汇合点实现，
//!   每次归约等价于一次跨全部分区的同步屏障
//!
//! # 示例
//!
//! ```
//! use pf_fvm::comm::CommWorld;
//! use std::thread;
//!
//! let contexts = CommWorld::create(2);
//! let handles: Vec<_> = contexts
//!     .into_iter()
//!     .map(|ctx| {
//!         thread::spawn(move || ctx.all_reduce_sum(ctx.rank() as f64 + 1.0))
//!     })
//!     .collect();
//! for h in handles {
//!     assert_eq!(h.join().unwrap(), 3.0);
//! }
//! ```

use parking_lot::{Condvar, Mutex};
use pf_foundation::{PfError, PfResult, Scalar};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// 接收等待上限，超时视为配对失败（死锁保护）
const RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// 分区间消息：标签 + 标量负载
struct Message {
    tag: u32,
    data: Vec<Scalar>,
}

/// 到某个对方 rank 的通道对
struct Link {
    tx: Sender<Message>,
    rx: Mutex<Receiver<Message>>,
}

// ============================================================
// 全局归约汇合点
// ============================================================

struct ReduceState {
    generation: u64,
    count: usize,
    acc: Vec<Scalar>,
    result: Vec<Scalar>,
}

/// 代际计数的归约屏障
///
/// 每个 rank 贡献一个标量向量，全部到齐后各自取走逐元素和。
struct Reducer {
    size: usize,
    state: Mutex<ReduceState>,
    cv: Condvar,
}

impl Reducer {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(ReduceState {
                generation: 0,
                count: 0,
                acc: Vec::new(),
                result: Vec::new(),
            }),
            cv: Condvar::new(),
        }
    }

    fn reduce_sum(&self, contrib: &[Scalar]) -> Vec<Scalar> {
        let mut st = self.state.lock();
        if st.count == 0 {
            st.acc = vec![0.0; contrib.len()];
        }
        debug_assert_eq!(st.acc.len(), contrib.len(), "归约向量长度不一致");
        for (a, &c) in st.acc.iter_mut().zip(contrib.iter()) {
            *a += c;
        }
        st.count += 1;

        if st.count == self.size {
            st.result = std::mem::take(&mut st.acc);
            st.count = 0;
            st.generation += 1;
            self.cv.notify_all();
            st.result.clone()
        } else {
            let gen = st.generation;
            while st.generation == gen {
                self.cv.wait(&mut st);
            }
            st.result.clone()
        }
    }
}

// ============================================================
// 通信上下文
// ============================================================

/// 一个分区（rank）的通信上下文
///
/// 串行运行用 [`CommContext::serial`]，多分区运行由
/// [`CommWorld::create`] 一次性建出整个 world。
pub struct CommContext {
    rank: usize,
    size: usize,
    links: HashMap<usize, Link>,
    reducer: Option<Arc<Reducer>>,
}

impl CommContext {
    /// 串行上下文（单分区，无通信）
    pub fn serial() -> Self {
        Self {
            rank: 0,
            size: 1,
            links: HashMap::new(),
            reducer: None,
        }
    }

    /// 本分区 rank
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// 分区总数
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// 是否为并行运行
    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.size > 1
    }

    /// 向对方 rank 提交一次发送（不阻塞）
    ///
    /// # 错误
    /// - 对方 rank 不在本 world 内
    /// - 对方通道已断开
    pub fn send(&self, peer: usize, tag: u32, data: &[Scalar]) -> PfResult<()> {
        let link = self.links.get(&peer).ok_or_else(|| {
            PfError::comm_mismatch(self.rank, peer, "目标 rank 不在通信域内")
        })?;
        link.tx
            .send(Message {
                tag,
                data: data.to_vec(),
            })
            .map_err(|_| PfError::CommDisconnected {
                rank: self.rank,
                peer,
            })
    }

    /// 等待并接收来自对方 rank 的一条消息
    ///
    /// 校验标签与长度；不匹配说明两侧的发送 / 接收序列错位，
    /// 属于致命通信错误。
    pub fn recv(&self, peer: usize, tag: u32, expected_len: usize) -> PfResult<Vec<Scalar>> {
        let link = self.links.get(&peer).ok_or_else(|| {
            PfError::comm_mismatch(self.rank, peer, "来源 rank 不在通信域内")
        })?;
        let rx = link.rx.lock();
        let msg = rx.recv_timeout(RECV_TIMEOUT).map_err(|_| {
            PfError::comm_mismatch(self.rank, peer, "接收超时（可能为发送/接收配对错位）")
        })?;
        if msg.tag != tag {
            return Err(PfError::comm_mismatch(
                self.rank,
                peer,
                format!("标签不匹配: 期望 {tag}, 实际 {}", msg.tag),
            ));
        }
        if msg.data.len() != expected_len {
            return Err(PfError::comm_mismatch(
                self.rank,
                peer,
                format!("长度不匹配: 期望 {expected_len}, 实际 {}", msg.data.len()),
            ));
        }
        Ok(msg.data)
    }

    /// 全局求和归约（标量）
    pub fn all_reduce_sum(&self, x: Scalar) -> Scalar {
        match &self.reducer {
            None => x,
            Some(r) => r.reduce_sum(&[x])[0],
        }
    }

    /// 全局求和归约（向量，逐元素）
    pub fn all_reduce_sum_vec(&self, x: &[Scalar]) -> Vec<Scalar> {
        match &self.reducer {
            None => x.to_vec(),
            Some(r) => r.reduce_sum(x),
        }
    }
}

/// 进程内通信域构建器
pub struct CommWorld;

impl CommWorld {
    /// 建立 `n` 个 rank 的进程内通信域
    ///
    /// 返回的上下文按 rank 顺序排列，通常各自移交给承载该分区的线程。
    ///
    /// # Panics
    /// - `n == 0`
    pub fn create(n: usize) -> Vec<CommContext> {
        assert!(n > 0, "分区数必须大于 0");
        let reducer = Arc::new(Reducer::new(n));

        // 先为每个有序对 (i -> j) 建通道，再组装上下文
        let mut txs: HashMap<(usize, usize), Sender<Message>> = HashMap::new();
        let mut rxs: HashMap<(usize, usize), Receiver<Message>> = HashMap::new();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let (tx, rx) = channel();
                    txs.insert((i, j), tx);
                    rxs.insert((i, j), rx);
                }
            }
        }

        (0..n)
            .map(|rank| {
                let mut links = HashMap::new();
                for peer in 0..n {
                    if peer != rank {
                        let tx = txs
                            .get(&(rank, peer))
                            .expect("通道构建遗漏")
                            .clone();
                        let rx = rxs.remove(&(peer, rank)).expect("通道构建遗漏");
                        links.insert(
                            peer,
                            Link {
                                tx,
                                rx: Mutex::new(rx),
                            },
                        );
                    }
                }
                CommContext {
                    rank,
                    size: n,
                    links,
                    reducer: Some(Arc::clone(&reducer)),
                }
            })
            .collect()
    }
}

// ============================================================
// 测试
// ============================================================
