//! Persistent store adapter.
//!
//! Implements [`EepromPort`] over a RAM working image that is mirrored to
//! flash on [`commit`](EepromPort::commit).
//!
//! - **`target_os = "espidf"`**: the image lives in NVS as a single blob
//!   (namespace `relaylink`, key `eeprom`).  ESP-IDF NVS commits are
//!   atomic per `nvs_commit()`, so a power loss mid-save keeps the last
//!   committed image.
//! - **all other targets**: the committed image is a second in-memory
//!   buffer, which lets tests model a power loss before commit.

use log::{info, warn};

use crate::app::ports::{EepromPort, StorageError};
use crate::store::REGION_LEN;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"relaylink\0";
#[cfg(target_os = "espidf")]
const KEY: &[u8] = b"eeprom\0";

pub struct EepromAdapter {
    image: Vec<u8>,
    #[cfg(not(target_os = "espidf"))]
    committed: Vec<u8>,
    #[cfg(not(target_os = "espidf"))]
    fail_commit: bool,
}

impl EepromAdapter {
    /// Open the store and load the last committed image.
    ///
    /// A missing or wrongly sized blob reads as a blank (zeroed) image.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, StorageError> {
        // SAFETY: called once from the main task before any other NVS use.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("Eeprom: erasing and re-initialising NVS partition");
            if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                return Err(StorageError::ReadFailed);
            }
        } else if ret != ESP_OK {
            return Err(StorageError::ReadFailed);
        }

        let mut image = vec![0u8; REGION_LEN];
        let loaded = with_nvs_handle(false, |handle| {
            let mut size = image.len();
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    KEY.as_ptr() as *const _,
                    image.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        });
        match loaded {
            Ok(size) if size == REGION_LEN => info!("Eeprom: loaded {} byte image", size),
            Ok(size) => {
                warn!("Eeprom: stored image has {} bytes, starting blank", size);
                image.fill(0);
            }
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => info!("Eeprom: no stored image"),
            Err(e) => {
                warn!("Eeprom: NVS read error {}, starting blank", e);
                image.fill(0);
            }
        }
        Ok(Self { image })
    }

    /// Simulation: a blank image of [`REGION_LEN`] bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, StorageError> {
        info!("Eeprom: simulation backend");
        Ok(Self {
            image: vec![0u8; REGION_LEN],
            committed: vec![0u8; REGION_LEN],
            fail_commit: false,
        })
    }

    /// Simulation: drop uncommitted writes, as a power cycle would.
    #[cfg(not(target_os = "espidf"))]
    pub fn power_cycle(&mut self) {
        self.image.clone_from(&self.committed);
    }

    /// Simulation: make every later commit fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_fail_commit(&mut self, fail: bool) {
        self.fail_commit = fail;
    }

    /// Simulation: the last committed image.
    #[cfg(not(target_os = "espidf"))]
    pub fn committed(&self) -> &[u8] {
        &self.committed
    }

    fn range(&self, addr: usize, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let end = addr.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        if end > self.image.len() {
            return Err(StorageError::OutOfBounds);
        }
        Ok(addr..end)
    }
}

/// Open the store namespace, execute a closure with the handle, then close.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
where
    F: FnOnce(nvs_handle_t) -> Result<T, i32>,
{
    let mut handle: nvs_handle_t = 0;
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };

    let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK {
        return Err(ret);
    }

    let result = f(handle);
    unsafe {
        nvs_close(handle);
    }
    result
}

impl EepromPort for EepromAdapter {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError> {
        let range = self.range(addr, data.len())?;
        self.image[range].copy_from_slice(data);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn commit(&mut self) -> Result<(), StorageError> {
        let image = &self.image;
        let result = with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    KEY.as_ptr() as *const _,
                    image.as_ptr() as *const _,
                    image.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("Eeprom: NVS write error {}", e);
            StorageError::CommitFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn commit(&mut self) -> Result<(), StorageError> {
        if self.fail_commit {
            warn!("Eeprom(sim): commit failure injected");
            return Err(StorageError::CommitFailed);
        }
        self.committed.clone_from(&self.image);
        Ok(())
    }
}
