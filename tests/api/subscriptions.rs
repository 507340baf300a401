use claims::{assert_matches, assert_ok};

use stock_watch::error::Error;

use crate::helpers::{random_user_id, subscription, TestSystem};

#[tokio::test]
async fn create_returns_false_for_duplicate_subscription() {
    let system = TestSystem::spawn().await;
    let user_id = random_user_id();

    let first = system
        .mediator
        .create_subscription(subscription(&user_id, 10))
        .await;
    let again = system
        .mediator
        .create_subscription(subscription(&user_id, 10))
        .await;

    assert!(assert_ok!(first));
    assert!(!assert_ok!(again));

    let active = assert_ok!(system.mediator.read_user_subscriptions(&user_id).await);
    assert_eq!(1, active.len());

    system.shutdown().await;
}

#[tokio::test]
async fn create_enriches_item_from_catalog() {
    let system = TestSystem::spawn().await;
    system.mount_stock(&[(10, "ComingSoon")], None).await;
    system.mount_product_page().await;
    let user_id = random_user_id();

    assert_ok!(
        system
            .mediator
            .create_subscription(subscription(&user_id, 10))
            .await
    );

    let stored = assert_ok!(system.mediator.read_user_all_subscriptions(&user_id).await);
    let item = &stored[0].shop_item;
    assert_eq!("Cable knit jumper", item.description);
    assert_eq!("10 (140cm)", item.size_label);
    assert!(item.url.ends_with("/ru/style/st1#111222"));

    system.shutdown().await;
}

#[tokio::test]
async fn create_succeeds_without_catalog() {
    let system = TestSystem::spawn().await;
    let user_id = random_user_id();

    let created = system
        .mediator
        .create_subscription(subscription(&user_id, 10))
        .await;

    assert!(assert_ok!(created));
    let stored = assert_ok!(system.mediator.read_user_subscriptions(&user_id).await);
    assert!(stored[0].shop_item.description.is_empty());
    assert!(stored[0].shop_item.url.is_empty());

    system.shutdown().await;
}

#[tokio::test]
async fn disable_then_enable_keeps_other_fields() {
    let system = TestSystem::spawn().await;
    system.mount_stock(&[(10, "ComingSoon")], None).await;
    system.mount_product_page().await;
    let user_id = random_user_id();
    let key = subscription(&user_id, 10).key();

    assert_ok!(
        system
            .mediator
            .create_subscription(subscription(&user_id, 10))
            .await
    );
    let original = assert_ok!(system.mediator.read_user_all_subscriptions(&user_id).await);

    assert_ok!(system.mediator.disable_subscription(&key).await);
    let disabled = assert_ok!(system.mediator.read_user_all_subscriptions(&user_id).await);
    assert!(!disabled[0].active);
    assert_eq!(original[0].shop_item, disabled[0].shop_item);
    assert!(!system.poller.is_watching(&key.item_key()));

    assert_ok!(system.mediator.enable_subscription(&key).await);
    let enabled = assert_ok!(system.mediator.read_user_all_subscriptions(&user_id).await);
    assert_eq!(original, enabled);
    assert!(system.poller.is_watching(&key.item_key()));

    system.shutdown().await;
}

#[tokio::test]
async fn toggling_unknown_subscription_is_not_found() {
    let system = TestSystem::spawn().await;
    let key = subscription(&random_user_id(), 10).key();

    assert_matches!(
        system.mediator.enable_subscription(&key).await,
        Err(Error::NotFound(_))
    );
    assert_matches!(
        system.mediator.disable_subscription(&key).await,
        Err(Error::NotFound(_))
    );

    system.shutdown().await;
}

#[tokio::test]
async fn remove_returns_false_for_absent_subscription() {
    let system = TestSystem::spawn().await;
    let user_id = random_user_id();
    let kept = subscription(&user_id, 10);
    let removed = subscription(&user_id, 12);

    assert_ok!(system.mediator.create_subscription(kept.clone()).await);
    assert_ok!(system.mediator.create_subscription(removed.clone()).await);

    assert!(assert_ok!(system.mediator.remove_subscription(&removed.key()).await));
    assert!(!assert_ok!(system.mediator.remove_subscription(&removed.key()).await));

    let remaining = assert_ok!(system.mediator.read_user_all_subscriptions(&user_id).await);
    assert_eq!(vec![kept.key()], remaining.iter().map(|s| s.key()).collect::<Vec<_>>());
    assert!(!system.poller.is_watching(&removed.shop_item.key()));
    assert!(system.poller.is_watching(&kept.shop_item.key()));

    system.shutdown().await;
}

#[tokio::test]
async fn unknown_user_has_no_subscriptions() {
    let system = TestSystem::spawn().await;
    let user_id = random_user_id();

    assert!(assert_ok!(system.mediator.read_user_subscriptions(&user_id).await).is_empty());
    assert!(assert_ok!(system.mediator.read_user_all_subscriptions(&user_id).await).is_empty());

    system.shutdown().await;
}
