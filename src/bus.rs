//! Paged memory bus: a device-dispatch layer sitting between the CPU's
//! execution context and the handful of memory-mapped peripherals a
//! Genesis-compatible system exposes (cartridge ROM, work RAM, VDP, sound
//! hardware, and so on).
//!
//! The address space is divided into fixed-size pages; each page maps to
//! at most one device, resolved through a flat index table so dispatch
//! stays O(1) regardless of how many devices are mapped.

use std::fmt;

/// A memory-mapped peripheral. `mask` carries the bits of `addr`/`data`
/// the bus guarantees are meaningful (devices narrower than the bus's
/// configured data width ignore the high bits of `mask`).
pub trait Device {
    fn read(&mut self, addr: u32, mask: u32) -> u32;
    fn write(&mut self, addr: u32, mask: u32, data: u32);
}

/// The default device mapped to any page nobody else claimed: reads
/// return zero, writes are discarded.
#[derive(Debug, Default)]
pub struct OpenBus;

impl Device for OpenBus {
    fn read(&mut self, _addr: u32, _mask: u32) -> u32 {
        0
    }
    fn write(&mut self, _addr: u32, _mask: u32, _data: u32) {}
}

/// Bus geometry: total address width, data bus width, page granularity,
/// and how many distinct devices may be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub addr_width: u32,
    pub data_width: u32,
    pub page_size: u32,
    pub max_devices: usize,
}

impl BusConfig {
    /// The Genesis main bus: 23-bit address space (68000's address bus,
    /// minus its fixed-low bit), 16-bit data, 1 MiB pages, up to seven
    /// devices (cartridge, work RAM, Z80 window, VDP, I/O, expansion,
    /// open bus).
    #[must_use]
    pub const fn genesis_main() -> Self {
        Self { addr_width: 23, data_width: 16, page_size: 0x0010_0000, max_devices: 7 }
    }

    /// The Genesis sub bus (the Z80 sound CPU's view of the world): 16-bit
    /// address space, 8-bit data, 4 KiB pages, up to five devices.
    #[must_use]
    pub const fn genesis_sub() -> Self {
        Self { addr_width: 16, data_width: 8, page_size: 0x1000, max_devices: 5 }
    }

    const fn page_count(self) -> u32 {
        (1u32 << self.addr_width) / self.page_size
    }
}

/// Construction-time failure building a [`Bus`].
#[derive(Debug)]
pub enum BusError {
    /// Two devices both claim at least one page.
    ConflictingDeviceMappings { page: u32 },
    /// A page has no device and no open-bus fallback was supplied.
    UnmappedPages { first_page: u32 },
    /// More devices were supplied than `max_devices` allows.
    MaxDeviceLimitReached { max: usize },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingDeviceMappings { page } => {
                write!(f, "page {page} is claimed by more than one device")
            }
            Self::UnmappedPages { first_page } => {
                write!(f, "page {first_page} has no device mapped and no open-bus fallback was given")
            }
            Self::MaxDeviceLimitReached { max } => {
                write!(f, "more devices were supplied than the configured maximum of {max}")
            }
        }
    }
}

impl std::error::Error for BusError {}

struct Mapping {
    start_page: u32,
    device: Box<dyn Device>,
}

/// A paged memory bus built from a [`BusConfig`] and a set of device
/// mappings.
pub struct Bus {
    config: BusConfig,
    page_to_device: Vec<u8>,
    devices: Vec<Mapping>,
}

impl Bus {
    /// Build a bus from its geometry and device list. Each entry in
    /// `devices` is `(start_page, page_count, device)`. `open_bus`, if
    /// given, handles every page no entry in `devices` claims.
    pub fn init(
        config: BusConfig,
        devices: Vec<(u32, u32, Box<dyn Device>)>,
        open_bus: Option<Box<dyn Device>>,
    ) -> Result<Self, BusError> {
        // Debug-only, like `UnmappedPages`: a release build trusts the host
        // to have wired up a sane device count.
        if cfg!(debug_assertions) && devices.len() > config.max_devices {
            return Err(BusError::MaxDeviceLimitReached { max: config.max_devices });
        }

        let page_count = config.page_count();
        let mut page_to_device = vec![u8::MAX; page_count as usize];
        let mut mappings = Vec::with_capacity(devices.len());

        for (index, (start_page, pages, device)) in devices.into_iter().enumerate() {
            let idx = index as u8;
            for page in start_page..start_page + pages {
                let slot = &mut page_to_device[page as usize];
                // Always checked: silently letting one device clobber another's
                // mapping would be a correctness footgun, not just a slow path.
                if *slot != u8::MAX {
                    return Err(BusError::ConflictingDeviceMappings { page });
                }
                *slot = idx;
            }
            mappings.push(Mapping { start_page, device });
        }

        let open_bus_index = mappings.len() as u8;
        match open_bus {
            Some(device) => {
                mappings.push(Mapping { start_page: 0, device });
                for slot in &mut page_to_device {
                    if *slot == u8::MAX {
                        *slot = open_bus_index;
                    }
                }
            }
            None => {
                // Scans the whole page table; only worth paying for in debug
                // builds. Release builds trust the caller to have covered
                // every page and fall back to treating gaps as device 0.
                if cfg!(debug_assertions) {
                    if let Some(first_page) = page_to_device.iter().position(|&d| d == u8::MAX) {
                        return Err(BusError::UnmappedPages { first_page: first_page as u32 });
                    }
                }
                for slot in &mut page_to_device {
                    if *slot == u8::MAX {
                        *slot = 0;
                    }
                }
            }
        }

        Ok(Self { config, page_to_device, devices: mappings })
    }

    fn resolve(&mut self, addr: u32) -> (&mut dyn Device, u32) {
        let page = (addr / self.config.page_size) as usize;
        let idx = self.page_to_device[page] as usize;
        let mapping = &mut self.devices[idx];
        let local = addr - mapping.start_page * self.config.page_size;
        (mapping.device.as_mut(), local)
    }

    #[must_use]
    pub const fn config(&self) -> BusConfig {
        self.config
    }

    pub fn read(&mut self, addr: u32, mask: u32) -> u32 {
        let (device, local) = self.resolve(addr);
        device.read(local, mask)
    }

    pub fn write(&mut self, addr: u32, mask: u32, data: u32) {
        let (device, local) = self.resolve(addr);
        device.write(local, mask, data);
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("config", &self.config)
            .field("devices", &self.devices.len())
            .finish()
    }
}
