#![doc = include_str!("../README.md")]

pub mod buffer;
pub mod config;
pub mod escl;
pub mod http;
pub mod ipp;
pub mod ipp_service;
pub mod printer;
pub mod server;
pub mod sink;
pub mod usbip;
pub mod wire;
pub mod xml;
