//! Private network address allocation for local machines

use crate::error::{ProviderError, ProviderResult};

/// Hands out `192.168.x.y` addresses starting at `192.168.3.2`.
///
/// `y` runs from 2 to 254, then wraps and `x` is incremented; the space
/// ends after `192.168.255.254`.
#[derive(Debug, Clone)]
pub struct PrivateIpAllocator {
    third: u16,
    fourth: u16,
}

impl PrivateIpAllocator {
    pub fn new() -> Self {
        Self {
            third: 3,
            fourth: 2,
        }
    }

    pub fn next_ip(&mut self) -> ProviderResult<String> {
        if self.third > 255 {
            return Err(ProviderError::AddressSpaceExhausted);
        }
        let ip = format!("192.168.{}.{}", self.third, self.fourth);

        self.fourth += 1;
        if self.fourth == 255 {
            self.fourth = 2;
            self.third += 1;
        }
        Ok(ip)
    }
}

impl Default for PrivateIpAllocator {
    fn default() -> Self {
        Self::new()
    }
}
