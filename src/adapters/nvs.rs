//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`]; typed configuration persistence comes for
//! free through the blanket [`ConfigPort`](crate::app::ports::ConfigPort)
//! impl.  Namespaces in use:
//!
//! | Namespace | Contents                              |
//! |-----------|---------------------------------------|
//! | `wifi`    | station credentials                   |
//! | `broker`  | broker endpoint + farm / coord ids    |
//! | `nodes`   | node registry table                   |
//! | `coord`   | radio, pairing, control, timing       |
//!
//! ESP-IDF commits are atomic per `nvs_commit()`, so a power cut never
//! leaves a half-written registry table behind.  The simulation backend is
//! an in-memory map.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{StorageError, StoragePort};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// NVS keys and namespaces are limited to 15 characters.
#[cfg(target_os = "espidf")]
const NVS_NAME_MAX: usize = 15;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  On first boot or after a layout version
    /// change the partition is erased and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("nvs: erasing and re-initialising partition");
                // SAFETY: as above.
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("nvs: ESP-IDF backend ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("nvs: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    /// NUL-terminated copy of an NVS name, truncated to the IDF limit.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; NVS_NAME_MAX + 1] {
        let mut buf = [0u8; NVS_NAME_MAX + 1];
        let len = name.len().min(NVS_NAME_MAX);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        buf
    }

    /// Open a namespace, run `f` with the handle, close it.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        namespace: &str,
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    ) -> Result<T, esp_err_t> {
        let ns = Self::c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        // SAFETY: `handle` was opened above and is closed exactly once.
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn commit(handle: nvs_handle_t) -> Result<(), esp_err_t> {
        // SAFETY: `handle` is an open read-write handle.
        let ret = unsafe { nvs_commit(handle) };
        if ret == ESP_OK { Ok(()) } else { Err(ret) }
    }
}

impl StoragePort for NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self
            .store
            .get(&Self::composite_key(namespace, key))
            .ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    #[cfg(target_os = "espidf")]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = Self::c_name(key);
        let result = Self::with_handle(namespace, false, |handle| {
            let mut size = buf.len();
            // SAFETY: `buf` is valid for `size` bytes; IDF writes at most that.
            let ret = unsafe {
                nvs_get_blob(handle, k.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret == ESP_OK { Ok(size) } else { Err(ret) }
        });
        match result {
            Ok(size) => Ok(size),
            // A namespace that was never written cannot be opened read-only.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
            Err(e) => {
                warn!("nvs: read {namespace}/{key} failed ({e})");
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let k = Self::c_name(key);
        Self::with_handle(namespace, true, |handle| {
            // SAFETY: `data` is valid for `data.len()` bytes.
            let ret = unsafe {
                nvs_set_blob(handle, k.as_ptr().cast(), data.as_ptr().cast(), data.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Self::commit(handle)
        })
        .map_err(|e| {
            warn!("nvs: write {namespace}/{key} failed ({e})");
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let k = Self::c_name(key);
        Self::with_handle(namespace, true, |handle| {
            // SAFETY: `k` is NUL-terminated.
            let ret = unsafe { nvs_erase_key(handle, k.as_ptr().cast()) };
            if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                return Err(ret);
            }
            Self::commit(handle)
        })
        .map_err(|_| StorageError::IoError)
    }

    #[cfg(not(target_os = "espidf"))]
    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .contains_key(&Self::composite_key(namespace, key))
    }

    #[cfg(target_os = "espidf")]
    fn exists(&self, namespace: &str, key: &str) -> bool {
        let k = Self::c_name(key);
        Self::with_handle(namespace, false, |handle| {
            // SAFETY: `k` is NUL-terminated; a null type pointer is allowed.
            let ret = unsafe { nvs_find_key(handle, k.as_ptr().cast(), core::ptr::null_mut()) };
            Ok(ret == ESP_OK)
        })
        .unwrap_or(false)
    }
}
