//! Request and response DTOs for the REST API.

pub mod booking_dto;
pub mod cart_dto;

pub use booking_dto::{
    ApproveRequest, ApproveResponse, BankAccountDto, CheckoutRequest, CheckoutResponse,
    CreateBookingResponse, DirectBookingRequest, ReservationDetailResponse, ReservationLineDto,
    SlotDto,
};
pub use cart_dto::{
    AddCartItemRequest, CartLineDto, CartViewResponse, ConfirmCartRequest, ConfirmCartResponse,
};
