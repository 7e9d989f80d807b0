//! 状态存储
//!
//! 扁平的键值状态容器，按键通知订阅者：
//! - 值以 `serde_json::Value` 保存，写入时用 `!=` 比较，相同的值不会触发通知
//! - `Key<T>` 为每个键绑定值类型，业务代码只通过类型化的键读写
//! - 单线程：`Store` 是 `Rc` 句柄，克隆后指向同一份状态
//!
//! 通知期间不持有任何借用，订阅者可以在回调里再次读写存储。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// 状态快照（浅拷贝）
pub type Snapshot = HashMap<String, Value>;

type Listener = Rc<dyn Fn(&Value, &Store) -> Result<(), ListenerError>>;

/// 订阅者返回的错误，只记录日志，不会中断其他订阅者
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl From<serde_json::Error> for ListenerError {
    fn from(err: serde_json::Error) -> Self {
        Self(format!("值解码失败: {err}"))
    }
}

/// 类型化的键
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

struct Inner {
    fields: RefCell<Snapshot>,
    listeners: RefCell<HashMap<String, Vec<(u64, Listener)>>>,
    next_id: Cell<u64>,
}

/// 状态容器句柄
#[derive(Clone)]
pub struct Store {
    inner: Rc<Inner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("fields", &self.inner.fields.borrow().len())
            .field("keys_with_listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                fields: RefCell::new(HashMap::new()),
                listeners: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// 用初始状态创建（不触发任何通知）
    pub fn with_initial<I, K>(initial: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = Self::new();
        store
            .inner
            .fields
            .borrow_mut()
            .extend(initial.into_iter().map(|(k, v)| (k.into(), v)));
        store
    }

    // ============ 无类型接口 ============

    /// 读取键的当前值
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.fields.borrow().get(key).cloned()
    }

    /// 整个状态的拷贝，修改拷贝不影响存储
    pub fn get_all(&self) -> Snapshot {
        self.inner.fields.borrow().clone()
    }

    /// 批量写入，返回发生变化的键（按变化顺序）
    ///
    /// 所有键写完后才开始通知；每个变化键的订阅者按注册顺序同步调用。
    /// 同一批次里重复写入的键，以最终值和批次前的值比较。
    pub fn set<I, K>(&self, updates: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let changed: Vec<String> = {
            let mut fields = self.inner.fields.borrow_mut();
            let mut before: Vec<(String, Option<Value>)> = Vec::new();
            for (key, value) in updates {
                let key = key.into();
                if !before.iter().any(|(seen, _)| *seen == key) {
                    before.push((key.clone(), fields.get(&key).cloned()));
                }
                fields.insert(key, value);
            }
            before
                .into_iter()
                .filter(|(key, old)| fields.get(key) != old.as_ref())
                .map(|(key, _)| key)
                .collect()
        };

        for key in &changed {
            self.notify(key);
        }
        changed
    }

    /// 注册订阅者，返回可用于取消的句柄
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&Value, &Store) -> Result<(), ListenerError> + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push((id, Rc::new(callback)));

        Subscription {
            store: Rc::downgrade(&self.inner),
            key: key.to_string(),
            id,
        }
    }

    fn is_subscribed(&self, key: &str, id: u64) -> bool {
        self.inner
            .listeners
            .borrow()
            .get(key)
            .is_some_and(|listeners| listeners.iter().any(|(other, _)| *other == id))
    }

    fn notify(&self, key: &str) {
        // 先复制订阅者列表，回调期间可以安全地订阅/取消订阅
        let listeners: Vec<(u64, Listener)> = self
            .inner
            .listeners
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default();

        for (id, listener) in listeners {
            // 本轮通知中已被取消的订阅者跳过
            if !self.is_subscribed(key, id) {
                continue;
            }
            let value = self.get(key).unwrap_or(Value::Null);
            if let Err(err) = listener(&value, self) {
                tracing::warn!(key, subscriber = id, error = %err, "订阅者处理失败");
            }
        }
    }

    // ============ 类型化接口 ============

    /// 读取并解码；键不存在或类型不符时返回 None
    pub fn get_typed<T: DeserializeOwned>(&self, key: Key<T>) -> Option<T> {
        let value = self.get(key.name())?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::debug!(key = key.name(), error = %err, "状态值类型不匹配");
                None
            }
        }
    }

    /// 读取，缺失时返回默认值
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: Key<T>) -> T {
        self.get_typed(key).unwrap_or_default()
    }

    /// 写入单个类型化的值
    pub fn set_typed<T: Serialize>(&self, key: Key<T>, value: &T) -> Vec<String> {
        self.update().with(key, value).apply()
    }

    /// 开始一次批量类型化写入
    pub fn update(&self) -> Update<'_> {
        Update {
            store: self,
            entries: Vec::new(),
        }
    }

    /// 订阅并在回调前解码新值
    pub fn subscribe_typed<T, F>(&self, key: Key<T>, callback: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, &Store) -> Result<(), ListenerError> + 'static,
    {
        self.subscribe(key.name(), move |value, store| {
            let decoded: T = serde_json::from_value(value.clone())?;
            callback(decoded, store)
        })
    }
}

/// 批量写入构建器，`apply` 时一次性提交
pub struct Update<'a> {
    store: &'a Store,
    entries: Vec<(String, Value)>,
}

impl Update<'_> {
    pub fn with<T: Serialize>(mut self, key: Key<T>, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(encoded) => self.entries.push((key.name().to_string(), encoded)),
            Err(err) => {
                tracing::warn!(key = key.name(), error = %err, "状态值无法编码，已忽略");
            }
        }
        self
    }

    pub fn apply(self) -> Vec<String> {
        self.store.set(self.entries)
    }
}

/// 订阅句柄
///
/// 丢弃句柄不会取消订阅，需要显式调用 `unsubscribe`。
#[derive(Debug)]
pub struct Subscription {
    store: Weak<Inner>,
    key: String,
    id: u64,
}

impl Subscription {
    /// 取消订阅，返回是否确实移除了注册
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.store.upgrade() else {
            return false;
        };
        let mut listeners = inner.listeners.borrow_mut();
        let Some(entries) = listeners.get_mut(&self.key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != self.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&self.key);
        }
        removed
    }
}
