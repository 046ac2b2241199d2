extern crate rw_guard;

use rw_guard::{ReadWriteGuard, ReaderId, WriterId};

fn main() {
    let guard = ReadWriteGuard::new(0);

    // Identities are only used in log lines, pick whatever fits your tasks
    let reader_id = ReaderId(0);
    let writer_id = WriterId(0);

    {
        let mut locked = guard.enter_write(writer_id);
        *locked = 2;
    }

    guard.write(writer_id, |value| *value += 2);

    {
        let locked = guard.enter_read(reader_id);

        println!("Value behind the guard is: {}", *locked);
        println!("Active readers: {:?}", guard.try_active_readers());
    }
}
