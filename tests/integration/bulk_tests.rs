//! Bulk call integration tests
//!
//! Drive the orchestrator against the sample resources the way a client of
//! the bulk endpoint would.

#[cfg(test)]
mod tests {
    use crate::common::fixtures::{CHILDREN, PARENTS};
    use crate::common::{ChildFactory, ParentFactory, TestGateway};
    use crate::assert_err;
    use bulk_rs::core::bulk::ResponseBody;
    use bulk_rs::{BulkRequestItem, ExecutionMode, GatewayError};
    use serde_json::json;

    fn statuses(items: &[bulk_rs::BulkResponseItem]) -> Vec<u16> {
        items.iter().map(|item| item.status).collect()
    }

    // ==================== Read batches ====================

    #[tokio::test]
    async fn test_bulk_view_with_pagination_and_filter() {
        let gateway = TestGateway::new();
        let parents = gateway.seed_parents(15).await;

        let children: Vec<BulkRequestItem> = (0..6)
            .map(|i| {
                BulkRequestItem::new("POST", CHILDREN)
                    .with_body(ChildFactory::create(i % 2 == 0, &parents[..1]))
            })
            .collect();
        assert!(gateway.bulk(children, true).await.is_success());

        let parent_query = format!("{}?sort=id&page%5Blimit%5D=5&meta=pagination", PARENTS);
        let child_query = format!("{}?sort=id&filter=child_is_active%3Dtrue", CHILDREN);
        let outcome = gateway
            .bulk(
                vec![
                    BulkRequestItem::new("GET", &parent_query),
                    BulkRequestItem::new("GET", &child_query),
                ],
                true,
            )
            .await;

        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.mode, ExecutionMode::Dedicated);

        let parent_item = &outcome.items[0];
        assert_eq!(parent_item.status, 200);
        assert_eq!(parent_item.endpoint, parent_query);
        let body = parent_item.response.as_json().unwrap();
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(body["meta"]["pagination"]["count"], 15);
        assert_eq!(body["meta"]["pagination"]["limit"], 5);

        let ids: Vec<&str> = data.iter().map(|it| it["id"].as_str().unwrap()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        for it in data {
            assert_eq!(it["type"], "entity.parent_entity");
            assert_eq!(it["bs:action"], "view");
            let attributes = &it["attributes"];
            for name in ["dt_created", "dt_updated", "name", "description", "is_active", "price", "dt_approved"] {
                assert!(attributes.get(name).is_some(), "missing attribute {}", name);
            }
            assert!(it["relationships"]["child_entities"]["data"].is_array());
        }

        let child_item = &outcome.items[1];
        assert_eq!(child_item.status, 200);
        let children = child_item.response.as_json().unwrap()["data"].as_array().unwrap();
        assert_eq!(children.len(), 3);
        assert!(children.iter().all(|it| it["attributes"]["child_is_active"] == true));
    }

    // ==================== Write batches ====================

    #[tokio::test]
    async fn test_bulk_update_commits_every_item() {
        let gateway = TestGateway::new();
        let parents = gateway.seed_parents(1).await;
        let parent_id = &parents[0];

        let child = ChildFactory::create(true, &[]);
        let outcome = gateway
            .bulk(vec![BulkRequestItem::new("POST", CHILDREN).with_body(child)], false)
            .await;
        let child_id = outcome.items[0].response.as_json().unwrap()["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let parent_endpoint = format!("{}{}/", PARENTS, parent_id);
        let child_endpoint = format!("{}{}/", CHILDREN, child_id);
        let items = vec![
            BulkRequestItem::new("PATCH", &parent_endpoint)
                .with_body(ParentFactory::rename(parent_id, "New parent test name")),
            BulkRequestItem::new("PATCH", &child_endpoint).with_body(json!({
                "data": {
                    "id": child_id,
                    "type": "entity.child_entity",
                    "attributes": { "child_name": "New child test name" },
                    "relationships": {
                        "parent_entities": {
                            "data": [{ "id": parent_id, "type": "entity.parent_entity" }]
                        }
                    },
                }
            })),
            BulkRequestItem::new("POST", CHILDREN)
                .with_body(ChildFactory::create(true, std::slice::from_ref(parent_id))),
            BulkRequestItem::new("GET", &parent_endpoint),
        ];
        let outcome = gateway.bulk(items, true).await;

        assert_eq!(outcome.status, 200);
        assert_eq!(statuses(&outcome.items), vec![200, 200, 201, 200]);

        let renamed = outcome.items[0].response.as_json().unwrap();
        assert_eq!(renamed["data"]["attributes"]["name"], "New parent test name");
        assert_eq!(renamed["data"]["bs:action"], "view");

        // The last item sees both links written earlier in the batch
        let linked = outcome.items[3].response.as_json().unwrap();
        assert_eq!(
            linked["data"]["relationships"]["child_entities"]["data"]
                .as_array()
                .unwrap()
                .len(),
            2
        );

        let (status, child) = gateway.fetch(&child_endpoint).await;
        assert_eq!(status, 200);
        assert_eq!(child["data"]["attributes"]["child_name"], "New child test name");
        assert_eq!(gateway.db.count("child_entity").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_atomic_failure_rolls_back_and_reports_every_item() {
        let gateway = TestGateway::new();
        let items = vec![
            BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create()),
            BulkRequestItem::new("POST", CHILDREN).with_body(json!({
                "data": {
                    "type": "entity.child_entity",
                    "attributes": { "child_name": "Broken", "child_price": "Wrong price" },
                }
            })),
            BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create()),
        ];

        let outcome = gateway.bulk(items, true).await;

        assert_eq!(outcome.status, 400);
        assert_eq!(statuses(&outcome.items), vec![201, 422, 201]);
        let errors = outcome.items[1].response.as_json().unwrap();
        assert_eq!(errors["errors"][0]["source"]["pointer"], "/attributes/child_price");
        assert_eq!(errors["errors"][0]["detail"], "Input should be a valid decimal");

        assert_eq!(gateway.db.count("parent_entity").unwrap(), 0);
        assert_eq!(gateway.db.count("child_entity").unwrap(), 0);
        assert_eq!(gateway.pool.stats().pinned, 0);
    }

    #[tokio::test]
    async fn test_update_of_existing_rows_follows_the_mode() {
        let gateway = TestGateway::new();
        let parent = ParentFactory::named("Old");
        let parent_id = parent["data"]["id"].as_str().unwrap().to_string();
        gateway
            .bulk(vec![BulkRequestItem::new("POST", PARENTS).with_body(parent)], false)
            .await;
        let created = gateway
            .bulk(
                vec![BulkRequestItem::new("POST", CHILDREN)
                    .with_body(ChildFactory::create(true, std::slice::from_ref(&parent_id)))],
                false,
            )
            .await;
        let child_id = created.items[0].response.as_json().unwrap()["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let parent_endpoint = format!("{}{}/", PARENTS, parent_id);
        let child_endpoint = format!("{}{}/", CHILDREN, child_id);
        let batch = || {
            vec![
                BulkRequestItem::new("PATCH", &parent_endpoint)
                    .with_body(ParentFactory::rename(&parent_id, "New")),
                BulkRequestItem::new("PATCH", &child_endpoint).with_body(json!({
                    "data": {
                        "id": child_id,
                        "type": "entity.child_entity",
                        "attributes": { "child_price": "Wrong price" },
                    }
                })),
                BulkRequestItem::new("POST", CHILDREN)
                    .with_body(ChildFactory::create(false, std::slice::from_ref(&parent_id))),
            ]
        };

        let atomic = gateway.bulk(batch(), true).await;
        assert_eq!(atomic.status, 400);
        assert_eq!(statuses(&atomic.items), vec![200, 422, 201]);
        let errors = atomic.items[1].response.as_json().unwrap();
        assert_eq!(errors["errors"][0]["source"]["pointer"], "/attributes/child_price");
        let (_, current) = gateway.fetch(&parent_endpoint).await;
        assert_eq!(current["data"]["attributes"]["name"], "Old");
        assert_eq!(gateway.db.count("child_entity").unwrap(), 1);

        let pooled = gateway.bulk(batch(), false).await;
        assert_eq!(pooled.status, 200);
        assert_eq!(statuses(&pooled.items), vec![200, 422, 201]);
        let (_, current) = gateway.fetch(&parent_endpoint).await;
        assert_eq!(current["data"]["attributes"]["name"], "New");
        assert_eq!(gateway.db.count("child_entity").unwrap(), 2);
        let (_, child) = gateway.fetch(&child_endpoint).await;
        assert_eq!(child["data"]["attributes"]["child_price"], "421.74");
    }

    #[tokio::test]
    async fn test_non_atomic_failure_keeps_successful_items() {
        let gateway = TestGateway::new();
        let items = vec![
            BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create()),
            BulkRequestItem::new("POST", PARENTS).with_body(json!({ "data": { "attributes": {} } })),
            BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create()),
        ];

        let outcome = gateway.bulk(items, false).await;

        assert_eq!(outcome.mode, ExecutionMode::Pooled);
        assert_eq!(outcome.status, 200);
        assert_eq!(statuses(&outcome.items), vec![201, 422, 201]);
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unique_violation_is_recovered_between_items() {
        let gateway = TestGateway::new();
        let existing = ParentFactory::named("Taken");
        gateway
            .bulk(vec![BulkRequestItem::new("POST", PARENTS).with_body(existing)], false)
            .await;

        let batch = || {
            vec![
                BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::named("Taken")),
                BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::named("Fresh")),
                BulkRequestItem::new("GET", &format!("{}?filter=name%3DFresh", PARENTS)),
            ]
        };

        // Later items still report their own outcome, not a poisoned transaction
        let atomic = gateway.bulk(batch(), true).await;
        assert_eq!(statuses(&atomic.items), vec![409, 201, 200]);
        assert_eq!(atomic.status, 400);
        let conflict = atomic.items[0].response.as_json().unwrap();
        assert_eq!(conflict["errors"][0]["code"], "ERR_CONFLICT");
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 1);

        let pooled = gateway.bulk(batch(), false).await;
        assert_eq!(statuses(&pooled.items), statuses(&atomic.items));
        assert_eq!(pooled.status, 200);
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_then_read_in_one_batch() {
        let gateway = TestGateway::new();
        let parents = gateway.seed_parents(2).await;
        let endpoint = format!("{}{}/", PARENTS, parents[0]);

        let outcome = gateway
            .bulk(
                vec![
                    BulkRequestItem::new("DELETE", &endpoint),
                    BulkRequestItem::new("GET", &endpoint),
                    BulkRequestItem::new("GET", PARENTS),
                ],
                true,
            )
            .await;

        assert_eq!(statuses(&outcome.items), vec![204, 404, 200]);
        assert_eq!(outcome.items[0].response, ResponseBody::Text(String::new()));
        // A 404 inside the batch is an item failure, so nothing is committed
        assert_eq!(outcome.status, 400);
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 2);
    }

    // ==================== Rejected calls ====================

    #[tokio::test]
    async fn test_malformed_item_rejects_whole_call() {
        let gateway = TestGateway::new();
        let result = gateway
            .orchestrator
            .execute(
                vec![
                    BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create()),
                    BulkRequestItem::new("FETCH IT", PARENTS),
                ],
                true,
                &[],
            )
            .await;

        let error = assert_err!(result);
        assert!(matches!(error, GatewayError::Validation(_)));
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds_in_both_modes() {
        let gateway = TestGateway::new();
        for atomic in [true, false] {
            let outcome = gateway.bulk(Vec::new(), atomic).await;
            assert_eq!(outcome.status, 200);
            assert!(outcome.items.is_empty());
        }
        assert_eq!(gateway.pool.stats().pinned, 0);
    }
}
