//! Domain layer: reservation state machine, money arithmetic, booking
//! events, and the clock abstraction used by the failover machinery.

pub mod booking_event;
pub mod clock;
pub mod event_bus;
pub mod items;
pub mod money;
pub mod payment;
pub mod reservation;

pub use booking_event::{BookingEvent, CustomerContact, LineSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event_bus::EventBus;
pub use items::ItemKind;
pub use payment::PaymentMethod;
pub use reservation::{ReservationState, generate_reservation_code};
