use openmetrics_collector::{
    descriptor::Descriptor,
    error::SinkClosed,
    sink::Sink,
    snapshot::{Snapshot, Value},
};
use procfs::process::{Limit, LimitValue, Process};
use tracing::warn;

use crate::Descs;

mod netstat;

pub(crate) fn collect(descs: &Descs, page_size: u64, sink: &mut dyn Sink) -> Result<(), SinkClosed> {
    let proc = match Process::myself() {
        Ok(proc) => proc,
        Err(error) => {
            warn!(%error, "failed to open /proc/self");
            return Ok(());
        }
    };

    match proc.stat() {
        Ok(stat) => {
            let tps = procfs::ticks_per_second() as f64;
            emit(
                sink,
                &descs.cpu_seconds_total,
                Value::Counter((stat.utime + stat.stime) as f64 / tps),
            )?;
            emit(
                sink,
                &descs.virtual_memory_bytes,
                Value::Gauge(stat.vsize as f64),
            )?;
            emit(
                sink,
                &descs.resident_memory_bytes,
                Value::Gauge((stat.rss * page_size) as f64),
            )?;
            match procfs::boot_time_secs() {
                Ok(boot_time) => emit(
                    sink,
                    &descs.start_time_seconds,
                    Value::Gauge(boot_time as f64 + stat.starttime as f64 / tps),
                )?,
                Err(error) => warn!(%error, "failed to read boot time"),
            }
        }
        Err(error) => warn!(%error, "failed to read process stat"),
    }

    match proc.fd_count() {
        Ok(open_fds) => emit(sink, &descs.open_fds, Value::Gauge(open_fds as f64))?,
        Err(error) => warn!(%error, "failed to count open file descriptors"),
    }

    match proc.limits() {
        Ok(limits) => {
            emit(
                sink,
                &descs.max_fds,
                Value::Gauge(effective_limit(&limits.max_open_files)),
            )?;
            emit(
                sink,
                &descs.virtual_memory_max_bytes,
                Value::Gauge(effective_limit(&limits.max_address_space)),
            )?;
        }
        Err(error) => warn!(%error, "failed to read process limits"),
    }

    match netstat::read(proc.pid) {
        Ok(octets) => {
            if let Some(received) = octets.received {
                emit(sink, &descs.network_receive_bytes_total, Value::Counter(received))?;
            }
            if let Some(transmitted) = octets.transmitted {
                emit(
                    sink,
                    &descs.network_transmit_bytes_total,
                    Value::Counter(transmitted),
                )?;
            }
        }
        Err(error) => warn!(%error, "failed to read network statistics"),
    }

    Ok(())
}

fn emit(sink: &mut dyn Sink, desc: &Descriptor, value: Value) -> Result<(), SinkClosed> {
    match Snapshot::new(desc.clone(), value, Vec::new()) {
        Ok(snapshot) => sink.emit(snapshot),
        Err(error) => {
            warn!(%error, "dropping process metric");
            Ok(())
        }
    }
}

/// The soft limit, falling back to the hard limit. `0` if both are unlimited.
fn effective_limit(limit: &Limit) -> f64 {
    match (&limit.soft_limit, &limit.hard_limit) {
        (LimitValue::Value(soft), _) => *soft as f64,
        (LimitValue::Unlimited, LimitValue::Value(hard)) => *hard as f64,
        (LimitValue::Unlimited, LimitValue::Unlimited) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_limit_takes_precedence() {
        let limit = Limit {
            soft_limit: LimitValue::Value(1024),
            hard_limit: LimitValue::Value(4096),
        };
        assert_eq!(1024.0, effective_limit(&limit));

        let limit = Limit {
            soft_limit: LimitValue::Unlimited,
            hard_limit: LimitValue::Value(4096),
        };
        assert_eq!(4096.0, effective_limit(&limit));

        let limit = Limit {
            soft_limit: LimitValue::Unlimited,
            hard_limit: LimitValue::Unlimited,
        };
        assert_eq!(0.0, effective_limit(&limit));
    }
}
