mod test_disconnect_announces_bye;
mod test_offer_reaches_room;
