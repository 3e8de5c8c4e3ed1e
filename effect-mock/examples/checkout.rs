use std::sync::Arc;

use effect_mock::*;
use serde_json::{Value, json};
use tokio::sync::broadcast;

/// Just enough of a runner for the demo: messages go over a broadcast bus
/// and calls invoke the function directly.
#[derive(Clone)]
struct BusRunner {
    bus: broadcast::Sender<Value>,
}

impl BusRunner {
    fn dispatch(&self, message: Value) {
        println!("  bus <- {message}");
        let _ = self.bus.send(message);
    }
}

impl Runner for BusRunner {
    fn run(&self, effect: Effect) -> BoxFuture<'static, Result<Value>> {
        match effect {
            Effect::Put(message) => {
                self.dispatch(message.clone());
                Box::pin(std::future::ready(Ok(message)))
            }
            Effect::Take(pattern) => {
                let mut rx = self.bus.subscribe();
                Box::pin(async move {
                    loop {
                        match rx.recv().await {
                            Ok(message) if pattern.matches(&message) => return Ok(message),
                            Ok(_) => continue,
                            Err(e) => return Err(Error::external(e)),
                        }
                    }
                })
            }
            Effect::Call { func, args } => func.invoke(args),
            other => Box::pin(std::future::ready(Ok(other.to_value()))),
        }
    }
}

#[tokio::main]
async fn main() -> Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "effect_mock=debug".into()),
        )
        .init();

    // The code under test: wait for a checkout, charge the card, report.
    let charge = Func::new("payments.charge", |args| async move {
        Ok(json!({"receipt": format!("r-{}", args[0])}))
    });
    let checkout = {
        let charge = charge.clone();
        Routine::new("checkout", move |ctx: TaskContext, args| {
            let charge = charge.clone();
            async move {
                let order = ctx.take("CHECKOUT").await?;
                match ctx.call(&charge, args).await {
                    Ok(receipt) => {
                        ctx.put(json!({"type": "PAID", "order": order["id"], "receipt": receipt}))
                            .await
                    }
                    Err(e) => {
                        ctx.put(json!({"type": "DECLINED", "order": order["id"], "reason": e.to_string()}))
                            .await
                    }
                }
            }
        })
    };

    let (bus, _) = broadcast::channel(16);
    let runner = BusRunner { bus };

    let mock = MockTask::new(checkout.with_args(vec![json!(4242)]))?;
    let customer = runner.clone();
    mock.on_take_action("CHECKOUT", move |_| {
        customer.dispatch(json!({"type": "CHECKOUT", "id": 7}));
    })
    .stub_call(
        &charge,
        &Func::sync("expired_card", |_| Err(Error::raised("card expired"))),
    )?;

    println!("Running checkout with an expired card:");
    mock.run(Arc::new(runner)).await?;
    mock.settle().await;

    println!();
    mock.dump();

    let declined = mock.query().put_action(json!({"type": "DECLINED"}));
    println!();
    println!("charge attempted:  {}", mock.query().call(&charge).is_present());
    println!("declined:          {}", declined.is_present());
    println!(
        "declined after the charge: {}",
        mock.query().call(&charge).followed_by().put_action(json!({"type": "DECLINED"})).is_present()
    );
    println!("task state:        {}", mock.state());
    Ok(())
}
