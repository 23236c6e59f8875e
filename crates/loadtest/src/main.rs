use goose::prelude::*;
use std::env;

fn client_id() -> String {
    env::var("CLIENT_ID").unwrap_or_else(|_| "demo-client".to_string())
}

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/healthz").await?;
    Ok(())
}

async fn lookup_application(user: &mut GooseUser) -> TransactionResult {
    let path = format!("/applications?clientId={}", client_id());
    let _goose_metrics = user.get(&path).await?;
    Ok(())
}

async fn get_userinfo(user: &mut GooseUser) -> TransactionResult {
    let token = env::var("ACCESS_TOKEN").unwrap_or_default();
    let request_builder = user
        .get_request_builder(&GooseMethod::Get, "/userinfo")?
        .bearer_auth(token);
    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .build();
    let _goose_metrics = user.request(goose_request).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    println!("Client id for lookups: {}", client_id());
    let with_userinfo = env::var("ACCESS_TOKEN").is_ok();
    if !with_userinfo {
        println!("No ACCESS_TOKEN environment variable set, skipping the UserInfo scenario");
    }

    let mut attack = GooseAttack::initialize()?
        .register_scenario(
            scenario!("HealthCheck").register_transaction(transaction!(health_check)),
        )
        .register_scenario(
            scenario!("ClientLookup").register_transaction(transaction!(lookup_application)),
        );
    if with_userinfo {
        attack = attack.register_scenario(
            scenario!("UserInfo").register_transaction(transaction!(get_userinfo)),
        );
    }
    attack.execute().await?;

    Ok(())
}
