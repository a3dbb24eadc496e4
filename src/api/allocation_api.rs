// ==========================================
// KandyPack Ledger - Allocation API
// ==========================================
// Request/response shapes of the allocation endpoints.
// Dates travel as YYYY-MM-DD strings.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::allocation::{Allocation, ScheduleAllocatedOrders};
use crate::domain::capacity::ScheduleCapacityInfo;
use crate::domain::order::OrderWithSpace;
use crate::domain::types::{AllocationType, ScheduleStatus};
use crate::engine::{AllocationLedger, AllocationOutcome, AllocationService};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// DTOs
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAllocationRequest {
    pub order_id: String,
    pub schedule_id: String,
    pub allocation_type: AllocationType,
    pub shipment_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAllocationResponse {
    pub allocation_id: String,
    pub order_id: String,
    pub schedule_id: String,
    pub shipment_date: String,
    /// Rail allocations only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_space: Option<f64>,
    pub status: ScheduleStatus,
    pub allocation_type: AllocationType,
}

impl From<&Allocation> for CreateAllocationResponse {
    fn from(a: &Allocation) -> Self {
        let allocated_space = match a.allocation_type() {
            AllocationType::Rail => Some(a.allocated_space()),
            AllocationType::Truck => None,
        };
        Self {
            allocation_id: a.allocation_id.clone(),
            order_id: a.order_id.clone(),
            schedule_id: a.schedule_id.clone(),
            shipment_date: a.shipment_date.format(DATE_FORMAT).to_string(),
            allocated_space,
            status: a.status,
            allocation_type: a.allocation_type(),
        }
    }
}

/// Book an order on the next trip of a vehicle along a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateNextRequest {
    pub order_id: String,
    pub allocation_type: AllocationType,
    pub vehicle_id: String,
    pub source_id: String,
    pub destination_id: String,
    /// Only trips strictly after this date; defaults to today onwards
    #[serde(default)]
    pub after_date: Option<String>,
}

fn parse_date(field: &str, raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|e| {
        ApiError::InvalidInput(format!("{} must be YYYY-MM-DD, got '{}': {}", field, raw, e))
    })
}

// ==========================================
// AllocationApi
// ==========================================
pub struct AllocationApi {
    ledger: Arc<AllocationLedger>,
    service: AllocationService,
}

impl AllocationApi {
    pub fn new(ledger: Arc<AllocationLedger>) -> Self {
        let service = AllocationService::new(ledger.clone());
        Self { ledger, service }
    }

    pub fn create_allocation(
        &self,
        req: &CreateAllocationRequest,
    ) -> ApiResult<CreateAllocationResponse> {
        let shipment_date = parse_date("shipment_date", &req.shipment_date)?;
        let allocation = self.ledger.create_allocation(
            &req.order_id,
            &req.schedule_id,
            req.allocation_type,
            shipment_date,
        )?;
        Ok(CreateAllocationResponse::from(&allocation))
    }

    pub fn cancel_allocation(&self, allocation_id: &str) -> ApiResult<()> {
        Ok(self.ledger.cancel_allocation(allocation_id)?)
    }

    pub fn update_allocation_status(
        &self,
        allocation_id: &str,
        status: ScheduleStatus,
    ) -> ApiResult<CreateAllocationResponse> {
        let allocation = self.ledger.update_allocation_status(allocation_id, status)?;
        Ok(CreateAllocationResponse::from(&allocation))
    }

    pub fn get_schedule_capacity(&self, schedule_id: &str) -> ApiResult<ScheduleCapacityInfo> {
        Ok(self.ledger.get_schedule_capacity(schedule_id)?)
    }

    pub fn get_schedule_allocated_orders(
        &self,
        schedule_id: &str,
    ) -> ApiResult<ScheduleAllocatedOrders> {
        Ok(self.ledger.get_schedule_allocated_orders(schedule_id)?)
    }

    pub fn list_schedule_allocations(&self, schedule_id: &str) -> ApiResult<Vec<Allocation>> {
        Ok(self.ledger.list_allocations_for_schedule(schedule_id)?)
    }

    pub fn list_order_allocations(&self, order_id: &str) -> ApiResult<Vec<Allocation>> {
        Ok(self.ledger.list_allocations_for_order(order_id)?)
    }

    pub fn get_order_with_space(&self, order_id: &str) -> ApiResult<OrderWithSpace> {
        Ok(self.service.order_with_space(order_id)?)
    }

    /// Next-available booking; Overflow comes back as a normal outcome
    pub fn allocate_next_available(
        &self,
        req: &AllocateNextRequest,
        today: NaiveDate,
    ) -> ApiResult<AllocationOutcome> {
        let after_date = req
            .after_date
            .as_deref()
            .map(|raw| parse_date("after_date", raw))
            .transpose()?;

        let query = self.service.route_query(
            req.allocation_type.transport_mode(),
            &req.vehicle_id,
            &req.source_id,
            &req.destination_id,
            after_date,
            today,
        )?;
        Ok(self.service.allocate_on_route(&req.order_id, &query)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerSettings;
    use crate::db::open_in_memory;
    use crate::domain::order::{Order, OrderItem, Product};
    use crate::domain::schedule::Schedule;
    use crate::domain::types::OrderStatus;
    use std::sync::Mutex;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, day).unwrap()
    }

    fn api_with_order(space: i64) -> AllocationApi {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let ledger = Arc::new(AllocationLedger::from_connection(
            conn,
            LedgerSettings::default(),
        ));
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(4), 100.0))
            .unwrap();
        ledger
            .register_schedule(&Schedule::road("RS1", "TR1", "ST1", "R1", d(5), 8.0))
            .unwrap();

        let repo = ledger.order_repo();
        repo.insert_order(&Order {
            order_id: "O1".to_string(),
            customer_id: "C1".to_string(),
            order_date: d(1),
            deliver_address: "addr".to_string(),
            deliver_city_id: "CITY1".to_string(),
            full_price: 80.0,
            status: OrderStatus::Placed,
            warehouse_id: None,
        })
        .unwrap();
        repo.upsert_product(&Product {
            product_type_id: "P1".to_string(),
            product_name: "Tea".to_string(),
            space_consumption_rate: 1.0,
        })
        .unwrap();
        repo.insert_items(&[OrderItem {
            item_id: "I1".to_string(),
            order_id: "O1".to_string(),
            store_id: "ST1".to_string(),
            product_type_id: "P1".to_string(),
            quantity: space,
            item_price: 1.0,
        }])
        .unwrap();

        AllocationApi::new(ledger)
    }

    #[test]
    fn test_create_rail_and_truck_responses() {
        let api = api_with_order(25);

        let rail = api
            .create_allocation(&CreateAllocationRequest {
                order_id: "O1".to_string(),
                schedule_id: "TS1".to_string(),
                allocation_type: AllocationType::Rail,
                shipment_date: "2025-11-04".to_string(),
            })
            .unwrap();
        assert_eq!(rail.allocated_space, Some(25.0));
        assert_eq!(rail.status, ScheduleStatus::Planned);

        let truck = api
            .create_allocation(&CreateAllocationRequest {
                order_id: "O1".to_string(),
                schedule_id: "RS1".to_string(),
                allocation_type: AllocationType::Truck,
                shipment_date: "2025-11-05".to_string(),
            })
            .unwrap();
        assert_eq!(truck.allocated_space, None);

        let json = serde_json::to_value(&truck).unwrap();
        assert_eq!(json["allocation_type"], "Truck");
        assert_eq!(json["status"], "PLANNED");
        assert!(json.get("allocated_space").is_none());
    }

    #[test]
    fn test_bad_date_is_invalid_input() {
        let api = api_with_order(1);
        let err = api
            .create_allocation(&CreateAllocationRequest {
                order_id: "O1".to_string(),
                schedule_id: "TS1".to_string(),
                allocation_type: AllocationType::Rail,
                shipment_date: "04/11/2025".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_request_deserializes_from_json() {
        let req: CreateAllocationRequest = serde_json::from_str(
            r#"{"order_id":"O1","schedule_id":"TS1","allocation_type":"Rail","shipment_date":"2025-11-04"}"#,
        )
        .unwrap();
        assert_eq!(req.allocation_type, AllocationType::Rail);
    }

    #[test]
    fn test_allocate_next_and_capacity() {
        let api = api_with_order(30);
        let outcome = api
            .allocate_next_available(
                &AllocateNextRequest {
                    order_id: "O1".to_string(),
                    allocation_type: AllocationType::Rail,
                    vehicle_id: "T1".to_string(),
                    source_id: "KDY".to_string(),
                    destination_id: "CMB".to_string(),
                    after_date: None,
                },
                d(1),
            )
            .unwrap();
        assert_eq!(outcome.allocation().unwrap().schedule_id, "TS1");

        let info = api.get_schedule_capacity("TS1").unwrap();
        assert_eq!(info.available_space, 70.0);
        assert_eq!(info.utilization_percentage, 30.0);

        let err = api.get_schedule_capacity("nope").unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
