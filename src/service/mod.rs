//! Business services: cart management, reservation lifecycle, and the
//! notification worker.

pub mod booking_service;
pub mod cart_service;
pub mod notifier;

pub use booking_service::BookingService;
pub use cart_service::{CartService, ConfirmedBooking};
pub use notifier::{
    HttpApiMailer, MailError, Mailer, NotificationLog, NotificationRecord, NotificationWorker,
    NullMailer, OutgoingMail,
};

use crate::error::BookingError;
use crate::persistence::BookingRepo;
use crate::persistence::models::{NewReservation, NewReservationLine};

/// How many fresh codes to try when the generator collides.
const CODE_RETRIES: usize = 3;

/// Persists a reservation, regenerating the code on a collision.
///
/// The generator's randomness makes collisions rare; the unique
/// constraint is the backstop and this retry loop absorbs it.
pub(crate) async fn persist_with_fresh_code(
    repo: &dyn BookingRepo,
    mut reservation: NewReservation,
    lines: &[NewReservationLine],
    empty_cart_for: Option<i64>,
) -> Result<(i64, String), BookingError> {
    for attempt in 0..CODE_RETRIES {
        if attempt > 0 {
            reservation.code = crate::domain::generate_reservation_code();
        }
        match repo
            .persist_reservation(&reservation, lines, empty_cart_for)
            .await
        {
            Ok(id) => return Ok((id, reservation.code)),
            Err(BookingError::CodeCollision) => {
                tracing::warn!(code = %reservation.code, "reservation code collision, retrying");
            }
            Err(other) => return Err(other),
        }
    }
    Err(BookingError::CodeCollision)
}
