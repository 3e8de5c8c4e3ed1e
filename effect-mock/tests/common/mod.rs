#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use effect_mock::{BoxFuture, Effect, Error, Func, Result, Runner, TaskContext};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};

/// A small in-process interpreter of the effect vocabulary.
///
/// - `Put` publishes on a broadcast bus and records the message.
/// - `Take` subscribes as soon as the effect is forwarded, then waits for
///   the first matching message.
/// - `Call` invokes the function, or a registered service of the same name
///   when the function was only declared.
/// - `Fork` spawns the routine on Tokio and resolves immediately.
/// - `All` and `Race` spawn their children and join them.
#[derive(Clone)]
pub struct LocalRunner {
    inner: Arc<Inner>,
}

struct Inner {
    bus: broadcast::Sender<Value>,
    dispatched: Mutex<Vec<Value>>,
    services: Mutex<HashMap<String, Func>>,
    forks: Mutex<Vec<JoinHandle<Result<Value>>>>,
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRunner {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                bus,
                dispatched: Mutex::new(Vec::new()),
                services: Mutex::new(HashMap::new()),
                forks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn shared(&self) -> Arc<dyn Runner> {
        Arc::new(self.clone())
    }

    /// Publish a message to every pending `Take`.
    pub fn dispatch(&self, message: Value) {
        self.inner.dispatched.lock().unwrap().push(message.clone());
        // No subscribers is fine: nobody is waiting.
        let _ = self.inner.bus.send(message);
    }

    pub fn dispatched(&self) -> Vec<Value> {
        self.inner.dispatched.lock().unwrap().clone()
    }

    /// Serve calls to declared functions with this name.
    pub fn register(&self, func: Func) {
        self.inner
            .services
            .lock()
            .unwrap()
            .insert(func.name().to_string(), func);
    }

    /// Wait for every spawned task, including ones spawned while waiting.
    pub async fn join_forks(&self) -> Vec<Result<Value>> {
        let mut results = Vec::new();
        loop {
            let handles: Vec<_> = self.inner.forks.lock().unwrap().drain(..).collect();
            if handles.is_empty() {
                return results;
            }
            for handle in handles {
                results.push(handle.await.unwrap_or_else(|e| Err(Error::external(e))));
            }
        }
    }

    fn call(&self, func: Func, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        if func.is_callable() {
            return func.invoke(args);
        }
        let service = self.inner.services.lock().unwrap().get(func.name()).cloned();
        match service {
            Some(service) => service.invoke(args),
            None => func.invoke(args),
        }
    }
}

impl Runner for LocalRunner {
    fn run(&self, effect: Effect) -> BoxFuture<'static, Result<Value>> {
        match effect {
            Effect::Put(message) => {
                self.dispatch(message.clone());
                Box::pin(std::future::ready(Ok(message)))
            }
            Effect::Take(pattern) => {
                let mut rx = self.inner.bus.subscribe();
                Box::pin(async move {
                    loop {
                        match rx.recv().await {
                            Ok(message) if pattern.matches(&message) => return Ok(message),
                            Ok(_) | Err(RecvError::Lagged(_)) => continue,
                            Err(RecvError::Closed) => return Err(Error::raised("bus closed")),
                        }
                    }
                })
            }
            Effect::Call { func, args } => self.call(func, args),
            Effect::Fork { routine, args } => {
                let name = routine.name().to_string();
                let handle = tokio::spawn(routine.start(TaskContext::new(self.shared()), args));
                self.inner.forks.lock().unwrap().push(handle);
                Box::pin(std::future::ready(Ok(json!({"forked": name}))))
            }
            Effect::All(effects) => {
                let handles: Vec<JoinHandle<Result<Value>>> = effects
                    .into_iter()
                    .map(|e| tokio::spawn(self.run(e)))
                    .collect();
                Box::pin(async move {
                    let mut results = Vec::with_capacity(handles.len());
                    for handle in handles {
                        results.push(handle.await.map_err(Error::external)??);
                    }
                    Ok(Value::Array(results))
                })
            }
            Effect::Race(entries) => {
                let mut set = JoinSet::new();
                for (key, effect) in entries {
                    let resolution = self.run(effect);
                    set.spawn(async move { (key, resolution.await) });
                }
                Box::pin(async move {
                    let (key, result) = set
                        .join_next()
                        .await
                        .ok_or_else(|| Error::raised("empty race"))?
                        .map_err(Error::external)?;
                    let mut winner = Map::new();
                    winner.insert(key, result?);
                    Ok(Value::Object(winner))
                })
            }
            Effect::Opaque(value) => Box::pin(std::future::ready(Ok(value))),
        }
    }
}
